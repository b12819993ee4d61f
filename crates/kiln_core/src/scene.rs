// scene.rs - Engine-owned entity table with names, transforms and hierarchy

use crate::{EntityId, Result, SceneError, TransformComponent};
use std::collections::BTreeMap;

/// Name given to entities created without one.
pub const DEFAULT_ENTITY_NAME: &str = "Entity";

#[derive(Debug, Clone)]
struct EntityRecord {
    name: String,
    transform: TransformComponent,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl EntityRecord {
    fn new(name: String) -> Self {
        Self {
            name,
            transform: TransformComponent::default(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Authoritative storage for every entity the engine owns.
///
/// IDs are issued from 1 upward and never reused, so a stale ID always
/// resolves to [`SceneError::EntityNotFound`] rather than a newer entity.
#[derive(Debug)]
pub struct Scene {
    next_entity_id: u32,
    entities: BTreeMap<EntityId, EntityRecord>,
    roots: Vec<EntityId>,
}

impl Scene {
    /// Create a new empty scene.
    pub fn new() -> Self {
        Self {
            next_entity_id: 1,
            entities: BTreeMap::new(),
            roots: Vec::new(),
        }
    }

    /// Create a root entity with an identity transform.
    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        let id = EntityId::from_raw(self.next_entity_id);
        self.next_entity_id += 1;

        let name = name.into();
        tracing::debug!(entity = id.raw(), %name, "entity created");

        self.entities.insert(id, EntityRecord::new(name));
        self.roots.push(id);
        id
    }

    /// Create a root entity named [`DEFAULT_ENTITY_NAME`].
    pub fn create_default_entity(&mut self) -> EntityId {
        self.create_entity(DEFAULT_ENTITY_NAME)
    }

    /// Destroy an entity.
    ///
    /// Children are detached to the root rather than destroyed.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(record) = self.entities.remove(&id) else {
            return false;
        };

        for child in &record.children {
            if let Some(child_record) = self.entities.get_mut(child) {
                child_record.parent = None;
                self.roots.push(*child);
            }
        }

        match record.parent {
            Some(parent) => {
                if let Some(parent_record) = self.entities.get_mut(&parent) {
                    parent_record.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        tracing::debug!(entity = id.raw(), "entity destroyed");
        true
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn name(&self, id: EntityId) -> Result<&str> {
        Ok(&self.record(id)?.name)
    }

    pub fn set_name(&mut self, id: EntityId, name: impl Into<String>) -> Result<()> {
        self.record_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn transform(&self, id: EntityId) -> Result<&TransformComponent> {
        Ok(&self.record(id)?.transform)
    }

    pub fn transform_mut(&mut self, id: EntityId) -> Result<&mut TransformComponent> {
        Ok(&mut self.record_mut(id)?.transform)
    }

    pub fn parent(&self, id: EntityId) -> Result<Option<EntityId>> {
        Ok(self.record(id)?.parent)
    }

    pub fn children(&self, id: EntityId) -> Result<&[EntityId]> {
        Ok(&self.record(id)?.children)
    }

    /// Entities without a parent, in creation/detach order.
    pub fn root_entities(&self) -> &[EntityId] {
        &self.roots
    }

    /// Move `child` under `parent`, or to the root when `parent` is `None`.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<()> {
        let current = self.record(child)?.parent;
        if current == parent {
            return Ok(());
        }

        if let Some(parent) = parent {
            self.record(parent)?;
            // Walk up from the new parent; meeting the child means a cycle.
            let mut cursor = Some(parent);
            while let Some(ancestor) = cursor {
                if ancestor == child {
                    return Err(SceneError::HierarchyCycle { child, parent });
                }
                cursor = self.record(ancestor)?.parent;
            }
        }

        match current {
            Some(old) => self.record_mut(old)?.children.retain(|c| *c != child),
            None => self.roots.retain(|r| *r != child),
        }

        match parent {
            Some(new) => self.record_mut(new)?.children.push(child),
            None => self.roots.push(child),
        }
        self.record_mut(child)?.parent = parent;
        Ok(())
    }

    /// All live entity IDs in ascending order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn record(&self, id: EntityId) -> Result<&EntityRecord> {
        if id.is_null() {
            return Err(SceneError::NullEntity);
        }
        self.entities.get(&id).ok_or(SceneError::EntityNotFound(id))
    }

    fn record_mut(&mut self, id: EntityId) -> Result<&mut EntityRecord> {
        if id.is_null() {
            return Err(SceneError::NullEntity);
        }
        self.entities.get_mut(&id).ok_or(SceneError::EntityNotFound(id))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
