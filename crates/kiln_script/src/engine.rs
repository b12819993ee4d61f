//! Script engine: owns behavior instances and drives their lifecycle
//!
//! One simulation step at a time, on one thread. Within a step every
//! instance not yet started runs `on_start` and then `on_update`, so the
//! update count always equals the number of steps driven and the start hook
//! strictly precedes the first update.

use crate::behavior::{Behavior, ScriptContext};
use crate::calls::{Instrumented, InternalCalls};
use crate::error::{BridgeError, Result};
use crate::metrics::CallCounter;
use crate::registry::BehaviorRegistry;
use kiln_core::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime options for the script engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Escalate invalid-handle failures from hook-local to step-fatal.
    pub strict_handles: bool,
    /// Emit a trace event for every boundary crossing.
    pub trace_internal_calls: bool,
}

/// Identifier of one attached behavior instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance {}", self.0)
    }
}

/// Where an attached instance is in its lifecycle.
///
/// Detached instances are dropped and no longer have a state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Started,
    /// `on_start` failed; no further hooks run.
    Faulted,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Hook {
    Start,
    Update,
    Destroy,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hook::Start => "on_start",
            Hook::Update => "on_update",
            Hook::Destroy => "on_destroy",
        })
    }
}

/// One hook invocation that returned an error.
#[derive(Debug, Clone, PartialEq)]
pub struct HookFailure {
    pub instance: InstanceId,
    pub entity: EntityId,
    pub behavior: String,
    pub hook: Hook,
    pub error: BridgeError,
}

/// Outcome of one engine call that ran hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub started: usize,
    pub updated: usize,
    pub destroyed: usize,
    pub failures: Vec<HookFailure>,
    /// Boundary crossings made by hooks (zero without the `metrics` feature).
    pub boundary_calls: u64,
}

impl StepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct BehaviorInstance {
    id: InstanceId,
    entity: EntityId,
    state: LifecycleState,
    behavior: Box<dyn Behavior>,
}

pub struct ScriptEngine {
    config: EngineConfig,
    registry: BehaviorRegistry,
    instances: Vec<BehaviorInstance>,
    next_instance_id: u64,
    frame_count: u64,
    total_calls: CallCounter,
}

impl ScriptEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, BehaviorRegistry::new())
    }

    pub fn with_registry(config: EngineConfig, registry: BehaviorRegistry) -> Self {
        Self {
            config,
            registry,
            instances: Vec::new(),
            next_instance_id: 1,
            frame_count: 0,
            total_calls: CallCounter::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BehaviorRegistry {
        &mut self.registry
    }

    /// Bind an already-built behavior to an entity. It starts on the next step.
    pub fn attach(&mut self, entity: EntityId, behavior: Box<dyn Behavior>) -> InstanceId {
        let id = InstanceId(self.next_instance_id);
        self.next_instance_id += 1;

        tracing::debug!(%id, entity = entity.raw(), behavior = behavior.name(), "behavior attached");
        self.instances.push(BehaviorInstance {
            id,
            entity,
            state: LifecycleState::Constructed,
            behavior,
        });
        id
    }

    /// Build a registered behavior by class name and attach it.
    pub fn instantiate(&mut self, entity: EntityId, class_name: &str) -> Result<InstanceId> {
        if entity.is_null() {
            return Err(BridgeError::NullEntity);
        }
        let behavior = self.registry.create(class_name, entity)?;
        Ok(self.attach(entity, behavior))
    }

    /// Run `on_start` for every instance that has not started yet.
    pub fn start(&mut self, calls: &mut dyn InternalCalls) -> Result<StepReport> {
        let mut calls = Instrumented::new(calls, self.config.trace_internal_calls);
        let mut report = StepReport::default();

        let config = &self.config;
        let outcome = self.instances.iter_mut().try_for_each(|instance| -> Result<()> {
            if instance.state == LifecycleState::Constructed {
                start_instance(config, instance, &mut calls, &mut report)?;
            }
            Ok(())
        });

        // Crossings made before an escalated failure still count.
        self.finish(&mut report, calls.counter());
        outcome.map(|()| report)
    }

    /// Advance one simulated frame.
    ///
    /// A failing hook aborts only its own invocation; the rest of the step
    /// still runs. With `strict_handles`, an invalid-handle failure instead
    /// aborts the step and is returned.
    pub fn update(&mut self, calls: &mut dyn InternalCalls, dt: f32) -> Result<StepReport> {
        let mut calls = Instrumented::new(calls, self.config.trace_internal_calls);
        let mut report = StepReport::default();
        self.frame_count += 1;

        let config = &self.config;
        let outcome = self.instances.iter_mut().try_for_each(|instance| -> Result<()> {
            if instance.state == LifecycleState::Constructed {
                start_instance(config, instance, &mut calls, &mut report)?;
            }
            if instance.state != LifecycleState::Started {
                return Ok(());
            }

            let mut ctx = ScriptContext::new(instance.entity, &mut calls);
            match instance.behavior.on_update(&mut ctx, dt) {
                Ok(()) => report.updated += 1,
                Err(error) => record_failure(config, instance, Hook::Update, error, &mut report)?,
            }
            Ok(())
        });

        self.finish(&mut report, calls.counter());
        outcome.map(|()| report)
    }

    /// Detach one instance, running `on_destroy` if it had started.
    pub fn detach(&mut self, instance: InstanceId, calls: &mut dyn InternalCalls) -> Result<StepReport> {
        let index = self
            .instances
            .iter()
            .position(|i| i.id == instance)
            .ok_or_else(|| BridgeError::Lifecycle(format!("{instance} is not attached")))?;

        let removed = self.instances.remove(index);
        Ok(self.tear_down(vec![removed], calls))
    }

    /// Tear down every instance bound to `entity`.
    ///
    /// Call this before the engine removes the entity, so `on_destroy` can
    /// still reach its state.
    pub fn destroy_entity(&mut self, entity: EntityId, calls: &mut dyn InternalCalls) -> StepReport {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.instances).into_iter().partition(|i| i.entity == entity);
        self.instances = kept;
        self.tear_down(removed, calls)
    }

    /// Tear down every instance.
    pub fn shutdown(&mut self, calls: &mut dyn InternalCalls) -> StepReport {
        let removed = std::mem::take(&mut self.instances);
        self.tear_down(removed, calls)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn state(&self, instance: InstanceId) -> Option<LifecycleState> {
        self.instances.iter().find(|i| i.id == instance).map(|i| i.state)
    }

    /// Instances bound to `entity`, in attach order.
    pub fn instances_for(&self, entity: EntityId) -> Vec<InstanceId> {
        self.instances.iter().filter(|i| i.entity == entity).map(|i| i.id).collect()
    }

    /// Number of `update` calls made so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Crossings made by hooks since the engine was created.
    pub fn total_calls(&self) -> &CallCounter {
        &self.total_calls
    }

    // Teardown never aborts early: every removed instance gets its chance.
    fn tear_down(&mut self, removed: Vec<BehaviorInstance>, calls: &mut dyn InternalCalls) -> StepReport {
        let mut calls = Instrumented::new(calls, self.config.trace_internal_calls);
        let mut report = StepReport::default();

        for mut instance in removed {
            if instance.state == LifecycleState::Started {
                let mut ctx = ScriptContext::new(instance.entity, &mut calls);
                if let Err(error) = instance.behavior.on_destroy(&mut ctx) {
                    log_failure(&instance, Hook::Destroy, &error);
                    report.failures.push(failure(&instance, Hook::Destroy, error));
                }
            }
            tracing::debug!(id = %instance.id, entity = instance.entity.raw(), "behavior detached");
            report.destroyed += 1;
        }

        self.finish(&mut report, calls.counter());
        report
    }

    fn finish(&self, report: &mut StepReport, counter: &CallCounter) {
        report.boundary_calls = counter.total();
        self.total_calls.merge(counter);
    }
}

fn start_instance<C: InternalCalls>(
    config: &EngineConfig,
    instance: &mut BehaviorInstance,
    calls: &mut C,
    report: &mut StepReport,
) -> Result<()> {
    let mut ctx = ScriptContext::new(instance.entity, calls);
    match instance.behavior.on_start(&mut ctx) {
        Ok(()) => {
            instance.state = LifecycleState::Started;
            report.started += 1;
            tracing::debug!(id = %instance.id, entity = instance.entity.raw(), "behavior started");
            Ok(())
        }
        Err(error) => {
            instance.state = LifecycleState::Faulted;
            record_failure(config, instance, Hook::Start, error, report)
        }
    }
}

fn record_failure(
    config: &EngineConfig,
    instance: &BehaviorInstance,
    hook: Hook,
    error: BridgeError,
    report: &mut StepReport,
) -> Result<()> {
    log_failure(instance, hook, &error);
    if config.strict_handles && error.is_invalid_handle() {
        return Err(error);
    }
    report.failures.push(failure(instance, hook, error));
    Ok(())
}

fn log_failure(instance: &BehaviorInstance, hook: Hook, error: &BridgeError) {
    tracing::error!(
        id = %instance.id,
        entity = instance.entity.raw(),
        behavior = instance.behavior.name(),
        %hook,
        %error,
        "behavior hook failed"
    );
}

fn failure(instance: &BehaviorInstance, hook: Hook, error: BridgeError) -> HookFailure {
    HookFailure {
        instance: instance.id,
        entity: instance.entity,
        behavior: instance.behavior.name().to_owned(),
        hook,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryCalls;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every hook call into a shared journal.
    struct Recorder {
        label: &'static str,
        journal: Rc<RefCell<Vec<String>>>,
        fail_start: bool,
    }

    impl Recorder {
        fn new(label: &'static str, journal: &Rc<RefCell<Vec<String>>>) -> Self {
            Self { label, journal: journal.clone(), fail_start: false }
        }
    }

    impl Behavior for Recorder {
        fn on_start(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
            self.journal.borrow_mut().push(format!("{}:start", self.label));
            if self.fail_start {
                return Err(BridgeError::Lifecycle("refused".into()));
            }
            Ok(())
        }

        fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, dt: f32) -> Result<()> {
            self.journal.borrow_mut().push(format!("{}:update:{dt}", self.label));
            Ok(())
        }

        fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
            self.journal.borrow_mut().push(format!("{}:destroy", self.label));
            Ok(())
        }
    }

    /// Reads its own position every update.
    struct Reader;
    impl Behavior for Reader {
        fn on_update(&mut self, ctx: &mut ScriptContext<'_>, _dt: f32) -> Result<()> {
            ctx.transform().position(ctx.calls())?;
            Ok(())
        }
    }

    fn id(raw: u32) -> EntityId {
        EntityId::from_raw(raw)
    }

    #[test]
    fn start_runs_once_before_first_update() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut calls = InMemoryCalls::new().with_entity(1, "A");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        let instance = engine.attach(id(1), Box::new(Recorder::new("a", &journal)));
        assert_eq!(engine.state(instance), Some(LifecycleState::Constructed));

        for _ in 0..3 {
            engine.update(&mut calls, 0.5).unwrap();
        }

        assert_eq!(
            *journal.borrow(),
            vec!["a:start", "a:update:0.5", "a:update:0.5", "a:update:0.5"]
        );
        assert_eq!(engine.state(instance), Some(LifecycleState::Started));
        assert_eq!(engine.frame_count(), 3);
    }

    #[test]
    fn explicit_start_is_not_repeated() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut calls = InMemoryCalls::new().with_entity(1, "A");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(id(1), Box::new(Recorder::new("a", &journal)));

        let report = engine.start(&mut calls).unwrap();
        assert_eq!(report.started, 1);
        let report = engine.update(&mut calls, 0.1).unwrap();
        assert_eq!((report.started, report.updated), (0, 1));
        assert_eq!(*journal.borrow(), vec!["a:start", "a:update:0.1"]);
    }

    #[test]
    fn late_attach_starts_on_next_step() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut calls = InMemoryCalls::new().with_entity(1, "A").with_entity(2, "B");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(id(1), Box::new(Recorder::new("a", &journal)));
        engine.update(&mut calls, 1.0).unwrap();

        engine.attach(id(2), Box::new(Recorder::new("b", &journal)));
        engine.update(&mut calls, 2.0).unwrap();

        assert_eq!(
            *journal.borrow(),
            vec!["a:start", "a:update:1", "a:update:2", "b:start", "b:update:2"]
        );
    }

    #[test]
    fn failed_start_faults_instance() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut calls = InMemoryCalls::new().with_entity(1, "A");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        let mut recorder = Recorder::new("a", &journal);
        recorder.fail_start = true;
        let instance = engine.attach(id(1), Box::new(recorder));

        let report = engine.update(&mut calls, 0.1).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].hook, Hook::Start);
        assert_eq!(report.failures[0].behavior, "Recorder");
        assert_eq!(engine.state(instance), Some(LifecycleState::Faulted));

        engine.update(&mut calls, 0.1).unwrap();
        let report = engine.detach(instance, &mut calls).unwrap();
        assert_eq!(report.destroyed, 1);
        // No update and no teardown for a faulted instance.
        assert_eq!(*journal.borrow(), vec!["a:start"]);
    }

    #[test]
    fn hook_failure_is_isolated_to_its_instance() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut calls = InMemoryCalls::new().with_entity(2, "B");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(id(1), Box::new(Reader));
        engine.attach(id(2), Box::new(Recorder::new("b", &journal)));

        let report = engine.update(&mut calls, 0.25).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error, BridgeError::EntityNotFound(id(1)));
        assert_eq!(report.failures[0].hook, Hook::Update);
        assert_eq!(*journal.borrow(), vec!["b:start", "b:update:0.25"]);
    }

    #[test]
    fn strict_handles_abort_the_step() {
        let mut calls = InMemoryCalls::new();
        let config = EngineConfig { strict_handles: true, ..EngineConfig::default() };
        let mut engine = ScriptEngine::new(config);
        engine.attach(id(1), Box::new(Reader));

        assert_eq!(
            engine.update(&mut calls, 0.1).err(),
            Some(BridgeError::EntityNotFound(id(1)))
        );
    }

    #[test]
    fn destroy_entity_tears_down_only_its_instances() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut calls = InMemoryCalls::new().with_entity(1, "A").with_entity(2, "B");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(id(1), Box::new(Recorder::new("a", &journal)));
        let kept = engine.attach(id(2), Box::new(Recorder::new("b", &journal)));
        engine.update(&mut calls, 1.0).unwrap();
        journal.borrow_mut().clear();

        let report = engine.destroy_entity(id(1), &mut calls);
        assert_eq!(report.destroyed, 1);
        assert_eq!(*journal.borrow(), vec!["a:destroy"]);
        assert!(engine.instances_for(id(1)).is_empty());
        assert_eq!(engine.instances_for(id(2)), vec![kept]);

        let report = engine.shutdown(&mut calls);
        assert_eq!(report.destroyed, 1);
        assert_eq!(engine.instance_count(), 0);
    }

    #[test]
    fn detach_unknown_instance_fails() {
        let mut calls = InMemoryCalls::new();
        let mut engine = ScriptEngine::new(EngineConfig::default());
        let instance = engine.attach(id(1), Box::new(Reader));
        engine.detach(instance, &mut calls).unwrap();
        assert!(matches!(engine.detach(instance, &mut calls), Err(BridgeError::Lifecycle(_))));
        assert_eq!(engine.state(instance), None);
    }

    #[test]
    fn instantiate_uses_registry() {
        let mut registry = BehaviorRegistry::new();
        registry.register("Reader", |_| Ok(Box::new(Reader) as Box<dyn Behavior>));
        let mut engine = ScriptEngine::with_registry(EngineConfig::default(), registry);

        let instance = engine.instantiate(id(3), "Reader").unwrap();
        assert_eq!(engine.instances_for(id(3)), vec![instance]);
        assert_eq!(
            engine.instantiate(id(3), "Writer").err(),
            Some(BridgeError::UnknownBehavior("Writer".into()))
        );
        assert_eq!(engine.instantiate(EntityId::NULL, "Reader").err(), Some(BridgeError::NullEntity));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn report_counts_boundary_calls() {
        let mut calls = InMemoryCalls::new().with_entity(1, "A");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(id(1), Box::new(Reader));

        let report = engine.update(&mut calls, 0.1).unwrap();
        assert_eq!(report.boundary_calls, 1);
        engine.update(&mut calls, 0.1).unwrap();
        assert_eq!(engine.total_calls().total(), 2);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn escalated_step_still_counts_its_crossings() {
        let mut calls = InMemoryCalls::new().with_entity(1, "A");
        let config = EngineConfig {
            strict_handles: true,
            ..EngineConfig::default()
        };
        let mut engine = ScriptEngine::new(config);
        engine.attach(id(1), Box::new(Reader));
        engine.attach(id(2), Box::new(Reader));

        assert_eq!(engine.update(&mut calls, 0.1).err(), Some(BridgeError::EntityNotFound(id(2))));
        assert_eq!(engine.frame_count(), 1);
        assert_eq!(engine.total_calls().total(), 2);
    }
}
