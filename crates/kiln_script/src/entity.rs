//! Script-side entity handle and transform proxy
//!
//! Both are `Copy` values carrying nothing but an [`EntityId`]. Every property
//! access is one live crossing through [`InternalCalls`]; nothing is cached,
//! so two reads may differ if another system wrote in between.

use crate::calls::InternalCalls;
use crate::error::Result;
use kiln_core::{EntityId, Vector3};

/// Handle to an engine-owned entity.
///
/// Handles with the same ID are interchangeable. Dropping one has no effect
/// on the entity; its lifetime belongs to the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    id: EntityId,
}

impl Entity {
    /// Sentinel handle; never refers to a live entity.
    pub const NULL: Self = Self { id: EntityId::NULL };

    /// Handles are minted by the hosting framework, not by behaviors.
    pub(crate) const fn from_id(id: EntityId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_null(&self) -> bool {
        self.id.is_null()
    }

    pub fn name<C: InternalCalls + ?Sized>(&self, calls: &C) -> Result<String> {
        calls.entity_get_name(self.id)
    }

    pub fn set_name<C: InternalCalls + ?Sized>(&self, calls: &mut C, name: &str) -> Result<()> {
        calls.entity_set_name(self.id, name)
    }

    /// A fresh proxy bound to this entity's ID.
    pub fn transform(&self) -> Transform {
        Transform::new(self.id)
    }
}

impl From<Entity> for EntityId {
    fn from(entity: Entity) -> Self {
        entity.id
    }
}

/// Capability to read and write one entity's transform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Transform {
    entity_id: EntityId,
}

impl Transform {
    pub(crate) const fn new(entity_id: EntityId) -> Self {
        Self { entity_id }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn position<C: InternalCalls + ?Sized>(&self, calls: &C) -> Result<Vector3> {
        calls.transform_get_position(self.entity_id)
    }

    pub fn set_position<C: InternalCalls + ?Sized>(&self, calls: &mut C, value: Vector3) -> Result<()> {
        calls.transform_set_position(self.entity_id, &value)
    }

    pub fn rotation<C: InternalCalls + ?Sized>(&self, calls: &C) -> Result<Vector3> {
        calls.transform_get_rotation(self.entity_id)
    }

    pub fn set_rotation<C: InternalCalls + ?Sized>(&self, calls: &mut C, value: Vector3) -> Result<()> {
        calls.transform_set_rotation(self.entity_id, &value)
    }

    pub fn scale<C: InternalCalls + ?Sized>(&self, calls: &C) -> Result<Vector3> {
        calls.transform_get_scale(self.entity_id)
    }

    pub fn set_scale<C: InternalCalls + ?Sized>(&self, calls: &mut C, value: Vector3) -> Result<()> {
        calls.transform_set_scale(self.entity_id, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::InternalCall;
    use crate::error::BridgeError;
    use crate::testing::InMemoryCalls;

    #[test]
    fn each_access_is_exactly_one_crossing() {
        let mut calls = InMemoryCalls::new().with_entity(7, "Player");
        let entity = calls.handle(7);
        let transform = entity.transform();

        transform.position(&calls).unwrap();
        transform.set_position(&mut calls, Vector3::new(1.0, 0.0, 0.0)).unwrap();
        entity.name(&calls).unwrap();

        let id = EntityId::from_raw(7);
        assert_eq!(
            calls.log(),
            vec![
                (InternalCall::TransformGetPosition, id),
                (InternalCall::TransformSetPosition, id),
                (InternalCall::EntityGetName, id),
            ]
        );
    }

    #[test]
    fn reads_are_never_cached() {
        let mut calls = InMemoryCalls::new().with_entity(3, "Crate");
        let transform = calls.handle(3).transform();

        assert_eq!(transform.rotation(&calls).unwrap(), Vector3::ZERO);
        // Another system writes behind the proxy's back.
        calls.transform_mut(3).unwrap().rotation = Vector3::new(0.0, 1.0, 0.0);
        assert_eq!(transform.rotation(&calls).unwrap(), Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn proxies_for_the_same_id_are_interchangeable() {
        let mut calls = InMemoryCalls::new().with_entity(5, "Door");
        let a = calls.handle(5);
        let b = calls.handle(5);
        let v = Vector3::new(2.0, 4.0, 8.0);

        a.transform().set_scale(&mut calls, v).unwrap();
        assert_eq!(b.transform().scale(&calls).unwrap(), v);
        assert_eq!(a, b);
        assert_eq!(a.transform(), b.transform());
    }

    #[test]
    fn name_round_trips() {
        let mut calls = InMemoryCalls::new().with_entity(1, "Old");
        let entity = calls.handle(1);
        entity.set_name(&mut calls, "New").unwrap();
        assert_eq!(entity.name(&calls).unwrap(), "New");
    }

    #[test]
    fn null_handle_is_never_live() {
        let calls = InMemoryCalls::new();
        assert!(Entity::NULL.is_null());
        assert_eq!(Entity::NULL.transform().position(&calls), Err(BridgeError::NullEntity));
    }

    #[test]
    fn unknown_id_is_a_distinguished_failure() {
        let calls = InMemoryCalls::new().with_entity(1, "Only");
        let ghost = calls.handle(99);
        assert_eq!(
            ghost.transform().position(&calls),
            Err(BridgeError::EntityNotFound(EntityId::from_raw(99)))
        );
    }
}
