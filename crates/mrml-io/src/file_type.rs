//! File-type tags
//!
//! Tags are free-form strings so new modules can introduce their own without
//! touching the registry; the constants cover the tags in common use.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

/// Dispatch key between the registry and its handlers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileType(Cow<'static, str>);

impl FileType {
    /// Whole scene documents
    pub const SCENE: Self = Self::from_static("SceneFile");
    /// Volumes (scalar, label map, vector)
    pub const VOLUME: Self = Self::from_static("VolumeFile");
    /// Surface models
    pub const MODEL: Self = Self::from_static("ModelFile");
    /// Transforms
    pub const TRANSFORM: Self = Self::from_static("TransformFile");
    /// Legacy fiducial lists
    pub const FIDUCIAL_LIST: Self = Self::from_static("FiducialListFile");
    /// Markups
    pub const MARKUPS: Self = Self::from_static("MarkupsFile");
    /// Color tables
    pub const COLOR_TABLE: Self = Self::from_static("ColorTableFile");
    /// Per-vertex scalars attached to a model
    pub const SCALAR_OVERLAY: Self = Self::from_static("ScalarOverlayFile");
    /// Segmentations
    pub const SEGMENTATION: Self = Self::from_static("SegmentationFile");
    /// Terminology dictionaries
    pub const TERMINOLOGY: Self = Self::from_static("TerminologyFile");
    /// No handler applicable
    pub const NO_FILE: Self = Self::from_static("NoFile");

    /// Tag from a static string
    #[inline]
    #[must_use]
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Tag from any string
    #[inline]
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    /// Tag string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the [`FileType::NO_FILE`] sentinel
    #[inline]
    #[must_use]
    pub fn is_no_file(&self) -> bool {
        self.as_str() == Self::NO_FILE.as_str()
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for FileType {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for FileType {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl From<&'static str> for FileType {
    fn from(tag: &'static str) -> Self {
        Self::from_static(tag)
    }
}

/// Whether a handler reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IoDirection {
    /// Loads files into the scene
    #[default]
    Read,

    /// Persists scene nodes to files
    Write,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_owned_compare_equal() {
        assert_eq!(FileType::MODEL, FileType::new("ModelFile"));
        assert_eq!(FileType::MODEL, "ModelFile");
    }

    #[test]
    fn no_file_sentinel() {
        assert!(FileType::NO_FILE.is_no_file());
        assert!(!FileType::SCENE.is_no_file());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&FileType::VOLUME).unwrap();
        assert_eq!(json, "\"VolumeFile\"");
        let back: FileType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FileType::VOLUME);
    }
}
