use scenegraph_core::error::CoreError;
use scenegraph_core::types::DbId;
use scenegraph_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Copy cancelled")]
    Cancelled,
}

impl EngineError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        Self::Core(CoreError::NotFound { entity, id })
    }
}
