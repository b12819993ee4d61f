//! Entity identifiers
//!
//! An entity is nothing more than a 32-bit index into engine-owned storage.
//! ID 0 is reserved as the null sentinel and is never issued by a [`Scene`].
//!
//! [`Scene`]: crate::Scene

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric entity identifier shared with the scripting boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Sentinel that never refers to a live entity.
    pub const NULL: Self = Self(0);

    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
