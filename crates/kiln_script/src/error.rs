//! Error types for the scripting bridge

use kiln_core::{EntityId, SceneError};
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures surfaced at the script/engine boundary.
///
/// Every failure originates engine-side (or inside hosted script code) and
/// propagates unchanged up to the hook that triggered it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The ID does not (or no longer) refer to a live entity
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// The null handle was used as if it referenced a live entity
    #[error("null entity handle used as a live entity")]
    NullEntity,

    /// A value could not cross the call boundary (bad pointer, invalid UTF-8, ...)
    #[error("marshaling failed: {0}")]
    Marshal(String),

    /// Engine-side failure with no more specific category
    #[error("engine error: {0}")]
    Engine(String),

    /// Exception raised inside hosted script code
    #[error("script '{behavior}' raised: {message}")]
    Script { behavior: String, message: String },

    /// No factory is registered under this behavior name
    #[error("behavior '{0}' is not registered")]
    UnknownBehavior(String),

    /// Lifecycle call made against an instance that cannot accept it
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// Script runtime could not be created or failed to evaluate source
    #[error("script runtime error: {0}")]
    Runtime(String),
}

impl BridgeError {
    /// True for failures caused by a handle that does not address a live entity.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, BridgeError::EntityNotFound(_) | BridgeError::NullEntity)
    }
}

impl From<SceneError> for BridgeError {
    fn from(error: SceneError) -> Self {
        match error {
            SceneError::EntityNotFound(id) => BridgeError::EntityNotFound(id),
            SceneError::NullEntity => BridgeError::NullEntity,
            other => BridgeError::Engine(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_errors_map_to_handle_errors() {
        let id = EntityId::from_raw(9);
        assert_eq!(BridgeError::from(SceneError::EntityNotFound(id)), BridgeError::EntityNotFound(id));
        assert_eq!(BridgeError::from(SceneError::NullEntity), BridgeError::NullEntity);
        assert!(BridgeError::from(SceneError::NullEntity).is_invalid_handle());

        let cycle = SceneError::HierarchyCycle { child: id, parent: id };
        assert!(!BridgeError::from(cycle).is_invalid_handle());
    }
}
