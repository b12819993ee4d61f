//! In-memory stand-in for the native engine
//!
//! Holds a plain entity table and logs every call made through the port, so
//! tests can assert exactly which crossings a behavior performed.

use crate::calls::{InternalCall, InternalCalls};
use crate::entity::Entity;
use crate::error::{BridgeError, Result};
use kiln_core::{EntityId, TransformComponent, Vector3};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Record {
    name: String,
    transform: TransformComponent,
}

/// Entity table keyed by arbitrary caller-chosen IDs.
#[derive(Debug, Default)]
pub struct InMemoryCalls {
    entities: HashMap<EntityId, Record>,
    log: RefCell<Vec<(InternalCall, EntityId)>>,
}

impl InMemoryCalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, id: u32, name: &str) -> Self {
        self.insert(id, name);
        self
    }

    /// Insert (or replace) an entity with an identity transform.
    ///
    /// ID 0 is the null sentinel and is ignored.
    pub fn insert(&mut self, id: u32, name: &str) {
        let id = EntityId::from_raw(id);
        if id.is_null() {
            return;
        }
        self.entities.insert(
            id,
            Record {
                name: name.to_owned(),
                transform: TransformComponent::default(),
            },
        );
    }

    pub fn remove(&mut self, id: u32) -> bool {
        self.entities.remove(&EntityId::from_raw(id)).is_some()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entities.contains_key(&EntityId::from_raw(id))
    }

    /// Handle for an ID, whether or not it is live.
    pub fn handle(&self, id: u32) -> Entity {
        Entity::from_id(EntityId::from_raw(id))
    }

    /// Direct access that bypasses the port and the call log, standing in for
    /// another engine system mutating state.
    pub fn transform_mut(&mut self, id: u32) -> Option<&mut TransformComponent> {
        self.entities.get_mut(&EntityId::from_raw(id)).map(|r| &mut r.transform)
    }

    pub fn log(&self) -> Vec<(InternalCall, EntityId)> {
        self.log.borrow().clone()
    }

    pub fn count(&self, call: InternalCall) -> usize {
        self.log.borrow().iter().filter(|(c, _)| *c == call).count()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    fn lookup(&self, call: InternalCall, id: EntityId) -> Result<&Record> {
        self.log.borrow_mut().push((call, id));
        if id.is_null() {
            return Err(BridgeError::NullEntity);
        }
        self.entities.get(&id).ok_or(BridgeError::EntityNotFound(id))
    }

    fn lookup_mut(&mut self, call: InternalCall, id: EntityId) -> Result<&mut Record> {
        self.log.get_mut().push((call, id));
        if id.is_null() {
            return Err(BridgeError::NullEntity);
        }
        self.entities.get_mut(&id).ok_or(BridgeError::EntityNotFound(id))
    }
}

impl InternalCalls for InMemoryCalls {
    fn entity_get_name(&self, id: EntityId) -> Result<String> {
        Ok(self.lookup(InternalCall::EntityGetName, id)?.name.clone())
    }

    fn entity_set_name(&mut self, id: EntityId, name: &str) -> Result<()> {
        self.lookup_mut(InternalCall::EntitySetName, id)?.name = name.to_owned();
        Ok(())
    }

    fn transform_get_position(&self, id: EntityId) -> Result<Vector3> {
        Ok(self.lookup(InternalCall::TransformGetPosition, id)?.transform.position)
    }

    fn transform_set_position(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.lookup_mut(InternalCall::TransformSetPosition, id)?.transform.position = *value;
        Ok(())
    }

    fn transform_get_rotation(&self, id: EntityId) -> Result<Vector3> {
        Ok(self.lookup(InternalCall::TransformGetRotation, id)?.transform.rotation)
    }

    fn transform_set_rotation(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.lookup_mut(InternalCall::TransformSetRotation, id)?.transform.rotation = *value;
        Ok(())
    }

    fn transform_get_scale(&self, id: EntityId) -> Result<Vector3> {
        Ok(self.lookup(InternalCall::TransformGetScale, id)?.transform.scale)
    }

    fn transform_set_scale(&mut self, id: EntityId, value: &Vector3) -> Result<()> {
        self.lookup_mut(InternalCall::TransformSetScale, id)?.transform.scale = *value;
        Ok(())
    }
}
