use crate::EntityId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SceneError>;

/// Errors raised by engine-side scene storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("entity {0} does not exist")]
    EntityNotFound(EntityId),

    #[error("the null entity cannot be used as a live entity")]
    NullEntity,

    #[error("parenting {child} under {parent} would create a cycle")]
    HierarchyCycle { child: EntityId, parent: EntityId },
}
