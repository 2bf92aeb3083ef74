//! Load/save property bag
//!
//! Provides [`IoProperties`], a string-keyed map of loosely typed JSON values
//! passed from callers to handlers. Well-known keys live in [`keys`].

use crate::error::IoError;
use mrml_scene::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Well-known property keys
pub mod keys {
    /// File to read or write (required for load and save)
    pub const FILE_NAME: &str = "fileName";
    /// All files of a multi-file series
    pub const FILE_NAMES: &str = "fileNames";
    /// Replace the scene instead of merging into it
    pub const CLEAR: &str = "clear";
    /// Override of the loaded node's name
    pub const NAME: &str = "name";
    /// Load a volume as a label map
    pub const LABEL_MAP: &str = "labelMap";
    /// Center the loaded volume
    pub const CENTERED: &str = "centered";
    /// Load only the named file of a series
    pub const SINGLE_FILE: &str = "singleFile";
    /// Compute window/level on load
    pub const AUTO_LEVEL: &str = "autoLevel";
    /// Node to persist (required for save)
    pub const NODE_ID: &str = "nodeID";
    /// Write format override
    pub const FILE_FORMAT: &str = "fileFormat";
    /// Writer compression hint
    pub const USE_COMPRESSION: &str = "useCompression";
    /// Model receiving a scalar overlay
    pub const MODEL_NODE_ID: &str = "modelNodeId";
    /// Model coordinate frame selector
    pub const COORDINATE_SYSTEM: &str = "coordinateSystem";
}

/// Property bag for a load or save request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IoProperties(Map<String, Value>);

impl IoProperties {
    /// Create empty bag
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Bag with `fileName` set
    #[must_use]
    pub fn for_file(file_name: impl AsRef<Path>) -> Self {
        Self::new().with(keys::FILE_NAME, path_value(file_name.as_ref()))
    }

    /// With a property
    #[inline]
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a property, returning the previous value
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.to_string(), value.into())
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check presence
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String value
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Boolean value; accepts `true`, non-zero numbers, and `"true"`/`"yes"`/`"1"`
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    /// `fileName`
    #[must_use]
    pub fn file_name(&self) -> Option<PathBuf> {
        self.get_str(keys::FILE_NAME)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    /// `fileName`, required
    ///
    /// # Errors
    /// Returns [`IoError::MissingProperty`] when absent or empty
    pub fn require_file_name(&self) -> Result<PathBuf, IoError> {
        self.file_name().ok_or(IoError::MissingProperty(keys::FILE_NAME))
    }

    /// `fileNames`; a single string is accepted as a one-element list
    #[must_use]
    pub fn file_names(&self) -> Vec<PathBuf> {
        match self.0.get(keys::FILE_NAMES) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(PathBuf::from)
                .collect(),
            Some(Value::String(s)) => vec![PathBuf::from(s)],
            _ => Vec::new(),
        }
    }

    /// Set `fileNames`
    pub fn set_file_names<P: AsRef<Path>>(&mut self, files: &[P]) {
        let values: Vec<Value> = files.iter().map(|p| path_value(p.as_ref())).collect();
        self.set(keys::FILE_NAMES, values);
    }

    /// `nodeID`
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        self.get_str(keys::NODE_ID)
            .filter(|s| !s.is_empty())
            .map(NodeId::from)
    }

    /// `nodeID`, required
    ///
    /// # Errors
    /// Returns [`IoError::MissingProperty`] when absent or empty
    pub fn require_node_id(&self) -> Result<NodeId, IoError> {
        self.node_id().ok_or(IoError::MissingProperty(keys::NODE_ID))
    }

    /// `name`
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get_str(keys::NAME)
    }

    /// `clear`
    #[inline]
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.get_bool(keys::CLEAR)
    }

    /// Iterate entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}
