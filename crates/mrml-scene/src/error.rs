//! Error types for scene operations

use crate::ids::NodeId;

/// Scene error type
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Referenced node is not in the scene
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Configuration could not be read
    #[error("configuration error: {0}")]
    Config(String),
}

impl SceneError {
    /// Create not-found error
    #[inline]
    pub fn not_found(id: impl Into<NodeId>) -> Self {
        Self::NodeNotFound(id.into())
    }
}
