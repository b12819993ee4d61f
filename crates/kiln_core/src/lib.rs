//! Kiln Engine Core
//!
//! Engine-owned simulation state that scripts only ever see through handles:
//! - Scene entity table (names, transforms, hierarchy)
//! - Value types shared with the scripting boundary
//! - Fixed-rate simulation time

pub mod entity;
pub mod error;
pub mod math;
pub mod scene;
pub mod time;
pub mod transform;

pub use entity::EntityId;
pub use error::{Result, SceneError};
pub use glam;
pub use math::Vector3;
pub use scene::Scene;
pub use transform::TransformComponent;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
