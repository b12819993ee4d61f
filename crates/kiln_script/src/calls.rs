//! Internal calls: the script→engine marshaling port
//!
//! Each method is one synchronous, blocking boundary crossing that maps 1:1
//! to a named operation on engine-owned state. Values cross by copy; nothing
//! returned here aliases engine storage after the call returns.
//!
//! Adapters:
//! - [`Scene`]: the engine's own entity table
//! - `Rc<RefCell<T>>`: one engine state shared between native behaviors and
//!   the hosted script runtime
//! - [`Instrumented`]: counts and optionally traces every crossing

use crate::error::{BridgeError, Result};
use crate::metrics::CallCounter;
use kiln_core::{EntityId, Scene, Vector3};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Stable identity of each boundary-crossing function.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InternalCall {
    EntityGetName,
    EntitySetName,
    TransformGetPosition,
    TransformSetPosition,
    TransformGetRotation,
    TransformSetRotation,
    TransformGetScale,
    TransformSetScale,
}

impl InternalCall {
    pub const COUNT: usize = 8;

    pub const ALL: [InternalCall; Self::COUNT] = [
        InternalCall::EntityGetName,
        InternalCall::EntitySetName,
        InternalCall::TransformGetPosition,
        InternalCall::TransformSetPosition,
        InternalCall::TransformGetRotation,
        InternalCall::TransformSetRotation,
        InternalCall::TransformGetScale,
        InternalCall::TransformSetScale,
    ];

    /// Name under which the call is registered with a script host.
    pub const fn name(self) -> &'static str {
        match self {
            InternalCall::EntityGetName => "Entity_GetName",
            InternalCall::EntitySetName => "Entity_SetName",
            InternalCall::TransformGetPosition => "Transform_GetPosition",
            InternalCall::TransformSetPosition => "Transform_SetPosition",
            InternalCall::TransformGetRotation => "Transform_GetRotation",
            InternalCall::TransformSetRotation => "Transform_SetRotation",
            InternalCall::TransformGetScale => "Transform_GetScale",
            InternalCall::TransformSetScale => "Transform_SetScale",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_write(self) -> bool {
        matches!(
            self,
            InternalCall::EntitySetName
                | InternalCall::TransformSetPosition
                | InternalCall::TransformSetRotation
                | InternalCall::TransformSetScale
        )
    }
}

impl fmt::Display for InternalCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One method per script→engine operation.
///
/// Implementations must report an ID that does not address a live entity as
/// [`BridgeError::EntityNotFound`] (or [`BridgeError::NullEntity`] for ID 0);
/// a read must never fabricate a zero vector for an unknown entity.
pub trait InternalCalls {
    fn entity_get_name(&self, id: EntityId) -> Result<String>;
    fn entity_set_name(&mut self, id: EntityId, name: &str) -> Result<()>;

    fn transform_get_position(&self, id: EntityId) -> Result<Vector3>;
    fn transform_set_position(&mut self, id: EntityId, value: &Vector3) -> Result<()>;

    fn transform_get_rotation(&self, id: EntityId) -> Result<Vector3>;
    fn transform_set_rotation(&mut self, id: EntityId, value: &Vector3) -> Result<()>;

    fn transform_get_scale(&self, id: EntityId) -> Result<Vector3>;
    fn transform_set_scale(&mut self, id: EntityId, value: &Vector3) -> Result<()>;
}

// ============================================================================
// Scene adapter
// ============================================================================

impl InternalCalls for Scene {
    fn entity_get_name(&self, id: EntityId) -> Result<String> {
        Ok(self.name(id)?.to_owned())
    }

    fn entity_set_name(&mut self, id: EntityId, name: &str) -> Result<()> {
        Ok(self.set_name(id, name)?)
    }

    fn transform_get_position(&self, id: EntityId) -> Result<Vector3> {
        Ok(self.transform(id)?.position)
    }

    fn transform_set_position(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.transform_mut(id)?.position = *value;
        Ok(())
    }

    fn transform_get_rotation(&self, id: EntityId) -> Result<Vector3> {
        Ok(self.transform(id)?.rotation)
    }

    fn transform_set_rotation(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.transform_mut(id)?.rotation = *value;
        Ok(())
    }

    fn transform_get_scale(&self, id: EntityId) -> Result<Vector3> {
        Ok(self.transform(id)?.scale)
    }

    fn transform_set_scale(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.transform_mut(id)?.scale = *value;
        Ok(())
    }
}

// ============================================================================
// Forwarding adapters
// ============================================================================

impl<T: InternalCalls + ?Sized> InternalCalls for &mut T {
    fn entity_get_name(&self, id: EntityId) -> Result<String> {
        (**self).entity_get_name(id)
    }

    fn entity_set_name(&mut self, id: EntityId, name: &str) -> Result<()> {
        (**self).entity_set_name(id, name)
    }

    fn transform_get_position(&self, id: EntityId) -> Result<Vector3> {
        (**self).transform_get_position(id)
    }

    fn transform_set_position(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        (**self).transform_set_position(id, value)
    }

    fn transform_get_rotation(&self, id: EntityId) -> Result<Vector3> {
        (**self).transform_get_rotation(id)
    }

    fn transform_set_rotation(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        (**self).transform_set_rotation(id, value)
    }

    fn transform_get_scale(&self, id: EntityId) -> Result<Vector3> {
        (**self).transform_get_scale(id)
    }

    fn transform_set_scale(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        (**self).transform_set_scale(id, value)
    }
}

/// Engine state reachable from several owners at once.
pub type SharedCalls = Rc<RefCell<dyn InternalCalls>>;

fn already_borrowed() -> BridgeError {
    BridgeError::Engine("engine state is already borrowed by an outer call".into())
}

// Borrows last for exactly one call, so a script calling back into the
// engine from inside a hook never observes an outstanding borrow.
impl<T: InternalCalls + ?Sized> InternalCalls for Rc<RefCell<T>> {
    fn entity_get_name(&self, id: EntityId) -> Result<String> {
        self.try_borrow().map_err(|_| already_borrowed())?.entity_get_name(id)
    }

    fn entity_set_name(&mut self, id: EntityId, name: &str) -> Result<()> {
        self.try_borrow_mut().map_err(|_| already_borrowed())?.entity_set_name(id, name)
    }

    fn transform_get_position(&self, id: EntityId) -> Result<Vector3> {
        self.try_borrow().map_err(|_| already_borrowed())?.transform_get_position(id)
    }

    fn transform_set_position(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.try_borrow_mut().map_err(|_| already_borrowed())?.transform_set_position(id, value)
    }

    fn transform_get_rotation(&self, id: EntityId) -> Result<Vector3> {
        self.try_borrow().map_err(|_| already_borrowed())?.transform_get_rotation(id)
    }

    fn transform_set_rotation(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.try_borrow_mut().map_err(|_| already_borrowed())?.transform_set_rotation(id, value)
    }

    fn transform_get_scale(&self, id: EntityId) -> Result<Vector3> {
        self.try_borrow().map_err(|_| already_borrowed())?.transform_get_scale(id)
    }

    fn transform_set_scale(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.try_borrow_mut().map_err(|_| already_borrowed())?.transform_set_scale(id, value)
    }
}

// ============================================================================
// Instrumentation
// ============================================================================

/// Wraps a port, counting every crossing and optionally tracing it.
pub struct Instrumented<C> {
    inner: C,
    counter: CallCounter,
    trace: bool,
}

impl<C: InternalCalls> Instrumented<C> {
    pub fn new(inner: C, trace: bool) -> Self {
        Self {
            inner,
            counter: CallCounter::new(),
            trace,
        }
    }

    pub fn counter(&self) -> &CallCounter {
        &self.counter
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn record<T>(&self, call: InternalCall, id: EntityId, result: &Result<T>) {
        self.counter.record(call);
        if self.trace {
            match result {
                Ok(_) => tracing::trace!(call = call.name(), entity = id.raw(), "internal call"),
                Err(e) => tracing::trace!(call = call.name(), entity = id.raw(), error = %e, "internal call failed"),
            }
        }
    }
}

impl<C: InternalCalls> InternalCalls for Instrumented<C> {
    fn entity_get_name(&self, id: EntityId) -> Result<String> {
        let result = self.inner.entity_get_name(id);
        self.record(InternalCall::EntityGetName, id, &result);
        result
    }

    fn entity_set_name(&mut self, id: EntityId, name: &str) -> Result<()> {
        let result = self.inner.entity_set_name(id, name);
        self.record(InternalCall::EntitySetName, id, &result);
        result
    }

    fn transform_get_position(&self, id: EntityId) -> Result<Vector3> {
        let result = self.inner.transform_get_position(id);
        self.record(InternalCall::TransformGetPosition, id, &result);
        result
    }

    fn transform_set_position(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        let result = self.inner.transform_set_position(id, value);
        self.record(InternalCall::TransformSetPosition, id, &result);
        result
    }

    fn transform_get_rotation(&self, id: EntityId) -> Result<Vector3> {
        let result = self.inner.transform_get_rotation(id);
        self.record(InternalCall::TransformGetRotation, id, &result);
        result
    }

    fn transform_set_rotation(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        let result = self.inner.transform_set_rotation(id, value);
        self.record(InternalCall::TransformSetRotation, id, &result);
        result
    }

    fn transform_get_scale(&self, id: EntityId) -> Result<Vector3> {
        let result = self.inner.transform_get_scale(id);
        self.record(InternalCall::TransformGetScale, id, &result);
        result
    }

    fn transform_set_scale(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        let result = self.inner.transform_set_scale(id, value);
        self.record(InternalCall::TransformSetScale, id, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable_and_unique() {
        let names: Vec<_> = InternalCall::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names[0], "Entity_GetName");
        assert_eq!(names[7], "Transform_SetScale");
        for (i, call) in InternalCall::ALL.iter().enumerate() {
            assert_eq!(call.index(), i);
        }
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), InternalCall::COUNT);
    }

    #[test]
    fn scene_adapter_round_trips_position() {
        let mut scene = Scene::new();
        let id = scene.create_entity("Player");
        let v = Vector3::new(1.0, -2.5, 3.0);

        scene.transform_set_position(id, &v).unwrap();
        assert_eq!(scene.transform_get_position(id).unwrap(), v);
        assert_eq!(scene.transform_get_scale(id).unwrap(), Vector3::ONE);
    }

    #[test]
    fn scene_adapter_reports_unknown_ids() {
        let scene = Scene::new();
        let missing = EntityId::from_raw(42);
        assert_eq!(scene.transform_get_position(missing), Err(BridgeError::EntityNotFound(missing)));
        assert_eq!(scene.entity_get_name(EntityId::NULL), Err(BridgeError::NullEntity));
    }

    #[test]
    fn shared_adapter_writes_through() {
        let scene = Rc::new(RefCell::new(Scene::new()));
        let id = scene.borrow_mut().create_entity("Shared");

        let mut shared: SharedCalls = scene.clone();
        shared.entity_set_name(id, "Renamed").unwrap();
        assert_eq!(scene.borrow().name(id).unwrap(), "Renamed");
    }

    #[test]
    fn shared_adapter_reports_outstanding_borrow() {
        let scene = Rc::new(RefCell::new(Scene::new()));
        let id = scene.borrow_mut().create_entity("Busy");

        let _guard = scene.borrow_mut();
        let shared: SharedCalls = scene.clone();
        assert!(matches!(shared.transform_get_position(id), Err(BridgeError::Engine(_))));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn instrumented_counts_each_crossing() {
        let mut scene = Scene::new();
        let id = scene.create_entity("Counted");
        let mut calls = Instrumented::new(&mut scene, false);

        let p = calls.transform_get_position(id).unwrap();
        calls.transform_set_position(id, &p).unwrap();
        let _ = calls.transform_get_position(EntityId::from_raw(99));

        assert_eq!(calls.counter().get(InternalCall::TransformGetPosition), 2);
        assert_eq!(calls.counter().get(InternalCall::TransformSetPosition), 1);
        assert_eq!(calls.counter().total(), 3);
    }
}
