//! Scene configuration

use crate::error::SceneError;
use serde::{Deserialize, Serialize};

/// Default number of cascade removals above which a batch envelope is used
pub const DEFAULT_BATCH_THRESHOLD: usize = 10;

/// Scene behaviour configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Remove display/storage nodes orphaned by a node removal
    pub auto_remove_display_and_storage_nodes: bool,
    /// Cascades removing more nodes than this are wrapped in a batch
    pub batch_threshold: usize,
}

impl SceneConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With auto-removal toggled
    #[inline]
    #[must_use]
    pub fn with_auto_remove(mut self, enabled: bool) -> Self {
        self.auto_remove_display_and_storage_nodes = enabled;
        self
    }

    /// With a batch threshold
    #[inline]
    #[must_use]
    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold;
        self
    }

    /// Parse from a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// Returns [`SceneError::Config`] if the document is malformed
    pub fn from_toml_str(source: &str) -> Result<Self, SceneError> {
        toml::from_str(source).map_err(|e| SceneError::Config(e.to_string()))
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            auto_remove_display_and_storage_nodes: true,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
        }
    }
}
