//! Behavior lifecycle contract
//!
//! A behavior is user logic bound to one entity. The engine drives it through
//! three hooks, each with a no-op default:
//!
//! ```text
//! Constructed ──first step──▶ Started ──every step──▶ on_update(dt) ─┐
//!                                │  ▲                               │
//!                                │  └───────────────────────────────┘
//!                                └──detach / entity destroyed──▶ on_destroy ──▶ (gone)
//! ```

use crate::calls::InternalCalls;
use crate::entity::{Entity, Transform};
use crate::error::Result;
use kiln_core::EntityId;

/// Logic the engine instantiates per (entity, behavior type) and drives per frame.
pub trait Behavior {
    /// Label used in logs and failure reports.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Runs exactly once, before the first `on_update`.
    fn on_start(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs once per simulated frame with the seconds elapsed since the last one.
    fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, _dt: f32) -> Result<()> {
        Ok(())
    }

    /// Runs when the behavior is detached or its entity is destroyed, only if
    /// `on_start` completed successfully.
    fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// What a hook sees: the entity it is bound to and the port into the engine.
pub struct ScriptContext<'a> {
    entity: Entity,
    calls: &'a mut dyn InternalCalls,
}

impl<'a> ScriptContext<'a> {
    pub fn new(entity: EntityId, calls: &'a mut dyn InternalCalls) -> Self {
        Self {
            entity: Entity::from_id(entity),
            calls,
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn calls(&self) -> &dyn InternalCalls {
        &*self.calls
    }

    pub fn calls_mut(&mut self) -> &mut dyn InternalCalls {
        &mut *self.calls
    }

    pub fn name(&self) -> Result<String> {
        self.entity.name(self.calls())
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let entity = self.entity;
        entity.set_name(self.calls_mut(), name)
    }

    pub fn transform(&self) -> Transform {
        self.entity.transform()
    }
}
