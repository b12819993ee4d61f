//! Script runtime management
//!
//! Hosts a QuickJS context with the internal calls installed as the native
//! `__kiln` object and the SDK prelude (`Vector3`, `Entity`, `Transform`,
//! `Behavior`) evaluated on top. Script classes extending `Behavior` become
//! [`ScriptBehavior`]s the engine drives like any native behavior.

use crate::behavior::{Behavior, ScriptContext};
use crate::calls::{Instrumented, InternalCall, InternalCalls, SharedCalls};
use crate::error::{BridgeError, Result};
use crate::registry::BehaviorRegistry;
use kiln_core::{EntityId, Vector3};
use rquickjs::function::This;
use rquickjs::{Context, Ctx, Exception, Function, Object, Persistent, Runtime, Value};
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

const PRELUDE: &str = include_str!("prelude.js");

/// The port as seen from script code: one shared engine state, counted.
type Port = Rc<RefCell<Instrumented<SharedCalls>>>;

/// Property stamped on exceptions thrown by the bridge. Holds the tag of the
/// failure remembered in [`PendingSlot`].
const BRIDGE_TAG: &str = "__kilnBridgeTag";

/// Last bridge failure raised inside a script call, so it can resurface
/// unchanged once its exception unwinds back to Rust.
#[derive(Default)]
struct PendingSlot {
    next_tag: Cell<u32>,
    error: Cell<Option<(u32, BridgeError)>>,
}

impl PendingSlot {
    fn remember(&self, error: BridgeError) -> u32 {
        let tag = self.next_tag.get().wrapping_add(1);
        self.next_tag.set(tag);
        self.error.set(Some((tag, error)));
        tag
    }

    /// The remembered failure, only if `tag` names it. Anything else was
    /// handled by the script and is dropped.
    fn claim(&self, tag: Option<u32>) -> Option<BridgeError> {
        match (self.error.take(), tag) {
            (Some((stored, error)), Some(tag)) if stored == tag => Some(error),
            _ => None,
        }
    }

    fn clear(&self) {
        self.error.take();
    }
}

type PendingError = Rc<PendingSlot>;

/// Script execution context
pub struct ScriptRuntime {
    #[allow(dead_code)] // Kept alive for context lifetime
    runtime: Runtime,
    pub context: Context,
    port: Port,
    pending_error: PendingError,
}

impl ScriptRuntime {
    pub fn new(calls: SharedCalls) -> Result<Self> {
        Self::with_tracing(calls, false)
    }

    /// Like [`ScriptRuntime::new`], tracing every crossing made by script code.
    pub fn with_tracing(calls: SharedCalls, trace: bool) -> Result<Self> {
        let runtime = Runtime::new().map_err(|e| BridgeError::Runtime(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| BridgeError::Runtime(e.to_string()))?;
        let port: Port = Rc::new(RefCell::new(Instrumented::new(calls, trace)));
        let pending_error = PendingError::default();

        context.with(|ctx| -> Result<()> {
            install_internal_calls(&ctx, &port, &pending_error)
                .map_err(|e| BridgeError::Runtime(format!("installing internal calls: {}", describe(&ctx, e))))?;
            ctx.eval::<(), _>(PRELUDE)
                .map_err(|e| BridgeError::Runtime(format!("prelude: {}", describe(&ctx, e))))
        })?;

        tracing::debug!("script runtime ready");
        Ok(Self {
            runtime,
            context,
            port,
            pending_error,
        })
    }

    pub fn execute_file(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Runtime(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "evaluating script");
        self.execute(&source)
    }

    pub fn execute(&self, source: &str) -> Result<()> {
        self.context.with(|ctx| {
            ctx.eval::<(), _>(source)
                .map_err(|e| BridgeError::Runtime(describe(&ctx, e)))
        })
    }

    /// Call a global JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<()> {
        self.context.with(|ctx| {
            self.pending_error.clear();
            let result = (|| -> rquickjs::Result<()> {
                let func: Function = ctx.globals().get(name)?;
                func.call::<_, ()>(())
            })();
            result.map_err(|e| self.script_error(&ctx, name, e))
        })
    }

    /// Construct script class `class_name` bound to `entity`.
    ///
    /// The class must be declared at the top level of an evaluated script
    /// and extend `Behavior`.
    pub fn instantiate(runtime: &Rc<Self>, class_name: &str, entity: EntityId) -> Result<ScriptBehavior> {
        if !is_identifier(class_name) {
            return Err(BridgeError::UnknownBehavior(class_name.to_owned()));
        }
        if entity.is_null() {
            return Err(BridgeError::NullEntity);
        }

        let object = runtime.context.with(|ctx| -> Result<Persistent<Object<'static>>> {
            runtime.pending_error.clear();
            let class: Value = ctx.eval(class_name).map_err(|e| {
                tracing::debug!(class = class_name, error = %describe(&ctx, e), "script class lookup failed");
                BridgeError::UnknownBehavior(class_name.to_owned())
            })?;

            let make: Function = ctx
                .globals()
                .get("__kilnInstantiate")
                .map_err(|e| runtime.script_error(&ctx, class_name, e))?;
            let object: Object = make
                .call((class, entity.raw()))
                .map_err(|e| runtime.script_error(&ctx, class_name, e))?;
            Ok(Persistent::save(&ctx, object))
        })?;

        tracing::debug!(class = class_name, entity = entity.raw(), "script behavior instantiated");
        Ok(ScriptBehavior {
            object,
            class_name: class_name.to_owned(),
            entity,
            runtime: runtime.clone(),
        })
    }

    /// Make script class `class_name` constructible through `registry`.
    pub fn register_class(runtime: &Rc<Self>, registry: &mut BehaviorRegistry, class_name: &str) {
        let runtime = runtime.clone();
        let name = class_name.to_owned();
        registry.register(class_name, move |entity| {
            let behavior = ScriptRuntime::instantiate(&runtime, &name, entity)?;
            Ok(Box::new(behavior) as Box<dyn Behavior>)
        });
    }

    /// Crossings made by script code so far (zero without the `metrics` feature).
    pub fn boundary_calls(&self) -> u64 {
        self.port.try_borrow().map(|p| p.counter().total()).unwrap_or(0)
    }

    pub fn call_count(&self, call: InternalCall) -> u64 {
        self.port.try_borrow().map(|p| p.counter().get(call)).unwrap_or(0)
    }

    /// Turn a failed script call into a bridge error. When the exception is
    /// the one the bridge threw, the original bridge failure is returned.
    fn script_error(&self, ctx: &Ctx<'_>, behavior: &str, error: rquickjs::Error) -> BridgeError {
        if !matches!(error, rquickjs::Error::Exception) {
            self.pending_error.clear();
            return BridgeError::Script {
                behavior: behavior.to_owned(),
                message: error.to_string(),
            };
        }

        let value = ctx.catch();
        let tag = value
            .as_object()
            .and_then(|object| object.get::<_, Option<u32>>(BRIDGE_TAG).ok().flatten());
        match self.pending_error.claim(tag) {
            Some(original) => original,
            None => BridgeError::Script {
                behavior: behavior.to_owned(),
                message: render(&value),
            },
        }
    }
}

/// A script object driven through the [`Behavior`] hooks.
// `object` must drop before `runtime`.
pub struct ScriptBehavior {
    object: Persistent<Object<'static>>,
    class_name: String,
    entity: EntityId,
    runtime: Rc<ScriptRuntime>,
}

impl ScriptBehavior {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    fn invoke(&self, method: &str, dt: Option<f32>) -> Result<()> {
        let runtime = &self.runtime;
        runtime.context.with(|ctx| {
            runtime.pending_error.clear();
            let result = (|| -> rquickjs::Result<()> {
                let object = self.object.clone().restore(&ctx)?;
                let hook: Function = object.get(method)?;
                match dt {
                    Some(dt) => hook.call::<_, ()>((This(object), dt)),
                    None => hook.call::<_, ()>((This(object),)),
                }
            })();
            result.map_err(|e| runtime.script_error(&ctx, &self.class_name, e))
        })
    }
}

// Script hooks reach the engine through the runtime's own port; the hook
// context is not consulted.
impl Behavior for ScriptBehavior {
    fn name(&self) -> &str {
        &self.class_name
    }

    fn on_start(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        self.invoke("onStart", None)
    }

    fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, dt: f32) -> Result<()> {
        self.invoke("onUpdate", Some(dt))
    }

    fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        self.invoke("onDestroy", None)
    }
}

// ============================================================================
// Native bindings
// ============================================================================

fn install_internal_calls<'js>(ctx: &Ctx<'js>, port: &Port, pending: &PendingError) -> rquickjs::Result<()> {
    let kiln = Object::new(ctx.clone())?;

    {
        let (port, pending) = (port.clone(), pending.clone());
        kiln.set(
            InternalCall::EntityGetName.name(),
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: u32| -> rquickjs::Result<String> {
                let result = port
                    .try_borrow()
                    .map_err(|_| port_busy())
                    .and_then(|calls| calls.entity_get_name(EntityId::from_raw(id)));
                bridge(&ctx, &pending, result)
            })?,
        )?;
    }
    {
        let (port, pending) = (port.clone(), pending.clone());
        kiln.set(
            InternalCall::EntitySetName.name(),
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: u32, name: String| -> rquickjs::Result<()> {
                let result = port
                    .try_borrow_mut()
                    .map_err(|_| port_busy())
                    .and_then(|mut calls| calls.entity_set_name(EntityId::from_raw(id), &name));
                bridge(&ctx, &pending, result)
            })?,
        )?;
    }

    kiln.set(
        InternalCall::TransformGetPosition.name(),
        vector_getter(ctx, port, pending, |c, id| c.transform_get_position(id))?,
    )?;
    kiln.set(
        InternalCall::TransformSetPosition.name(),
        vector_setter(ctx, port, pending, |c, id, v| c.transform_set_position(id, v))?,
    )?;
    kiln.set(
        InternalCall::TransformGetRotation.name(),
        vector_getter(ctx, port, pending, |c, id| c.transform_get_rotation(id))?,
    )?;
    kiln.set(
        InternalCall::TransformSetRotation.name(),
        vector_setter(ctx, port, pending, |c, id, v| c.transform_set_rotation(id, v))?,
    )?;
    kiln.set(
        InternalCall::TransformGetScale.name(),
        vector_getter(ctx, port, pending, |c, id| c.transform_get_scale(id))?,
    )?;
    kiln.set(
        InternalCall::TransformSetScale.name(),
        vector_setter(ctx, port, pending, |c, id, v| c.transform_set_scale(id, v))?,
    )?;

    kiln.set(
        "log",
        Function::new(ctx.clone(), |level: String, message: String| match level.as_str() {
            "error" => tracing::error!(target: "script", "{message}"),
            "warn" => tracing::warn!(target: "script", "{message}"),
            "debug" => tracing::debug!(target: "script", "{message}"),
            _ => tracing::info!(target: "script", "{message}"),
        })?,
    )?;

    ctx.globals().set("__kiln", kiln)?;
    Ok(())
}

fn vector_getter<'js>(
    ctx: &Ctx<'js>,
    port: &Port,
    pending: &PendingError,
    read: fn(&Instrumented<SharedCalls>, EntityId) -> Result<Vector3>,
) -> rquickjs::Result<Function<'js>> {
    let (port, pending) = (port.clone(), pending.clone());
    Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: u32| -> rquickjs::Result<Vec<f32>> {
        let result = port
            .try_borrow()
            .map_err(|_| port_busy())
            .and_then(|calls| read(&*calls, EntityId::from_raw(id)));
        bridge(&ctx, &pending, result).map(|v| v.to_array().to_vec())
    })
}

fn vector_setter<'js>(
    ctx: &Ctx<'js>,
    port: &Port,
    pending: &PendingError,
    write: fn(&mut Instrumented<SharedCalls>, EntityId, &Vector3) -> Result<()>,
) -> rquickjs::Result<Function<'js>> {
    let (port, pending) = (port.clone(), pending.clone());
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, id: u32, x: f32, y: f32, z: f32| -> rquickjs::Result<()> {
            let value = Vector3::new(x, y, z);
            let result = port
                .try_borrow_mut()
                .map_err(|_| port_busy())
                .and_then(|mut calls| write(&mut *calls, EntityId::from_raw(id), &value));
            bridge(&ctx, &pending, result)
        },
    )
}

fn port_busy() -> BridgeError {
    BridgeError::Engine("script port re-entered during a call".into())
}

/// Raise a bridge failure into the script as a tagged `Error`, remembering
/// the original error under the same tag.
fn bridge<T>(ctx: &Ctx<'_>, pending: &PendingError, result: Result<T>) -> rquickjs::Result<T> {
    let error = match result {
        Ok(value) => return Ok(value),
        Err(error) => error,
    };

    let exception = Exception::from_message(ctx.clone(), &error.to_string())?;
    let tag = pending.remember(error);
    exception.as_object().set(BRIDGE_TAG, tag)?;
    Err(ctx.throw(exception.into_object().into_value()))
}

/// Render an rquickjs error, taking the pending exception off the context.
fn describe(ctx: &Ctx<'_>, error: rquickjs::Error) -> String {
    if !matches!(error, rquickjs::Error::Exception) {
        return error.to_string();
    }
    render(&ctx.catch())
}

fn render(value: &Value<'_>) -> String {
    if let Some(exception) = value.as_exception() {
        exception.message().unwrap_or_else(|| "uncaught exception".to_owned())
    } else if let Some(message) = value.as_string().and_then(|s| s.to_string().ok()) {
        message
    } else {
        format!("uncaught {value:?}")
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
