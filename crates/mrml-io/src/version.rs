//! Scene format versions
//!
//! Scene documents declare the application version that wrote them, e.g.
//! `Slicer4.4.0` or `4.13.0`. Loading a newer document than the reader
//! supports is allowed but produces a warning.

use crate::message::UserMessage;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// `major.minor.patch` triple; missing components are zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SceneVersion {
    /// Major
    pub major: u32,
    /// Minor
    pub minor: u32,
    /// Patch
    pub patch: u32,
}

impl SceneVersion {
    /// Create version
    #[inline]
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a declared version, skipping any alphabetic product prefix
    ///
    /// Returns `None` when no leading number is found.
    #[must_use]
    pub fn parse(declared: &str) -> Option<Self> {
        let numeric = declared.trim_start_matches(|c: char| !c.is_ascii_digit());
        let mut parts = numeric.split(['.', '-', ' ']).map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        });

        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    /// Warning when `declared` is newer than `self`
    #[must_use]
    pub fn check(&self, declared: &str) -> Option<UserMessage> {
        let version = Self::parse_logged(declared)?;
        (version > *self).then(|| self.newer_warning(version))
    }

    /// Warning when `declared` has a newer major version than `self`
    #[must_use]
    pub fn check_major(&self, declared: &str) -> Option<UserMessage> {
        let version = Self::parse_logged(declared)?;
        (version.major > self.major).then(|| self.newer_warning(version))
    }

    fn parse_logged(declared: &str) -> Option<Self> {
        let version = Self::parse(declared);
        if version.is_none() {
            tracing::debug!(declared, "Unparseable scene version");
        }
        version
    }

    fn newer_warning(&self, version: Self) -> UserMessage {
        UserMessage::warning(format!(
            "Scene was saved with version {version}, newer than the supported {supported}; \
             some content may not load correctly",
            supported = self
        ))
    }
}

impl Display for SceneVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_versions() {
        assert_eq!(SceneVersion::parse("Slicer4.4.0"), Some(SceneVersion::new(4, 4, 0)));
        assert_eq!(SceneVersion::parse("4.13"), Some(SceneVersion::new(4, 13, 0)));
        assert_eq!(SceneVersion::parse("2"), Some(SceneVersion::new(2, 0, 0)));
        assert_eq!(SceneVersion::parse("unknown"), None);
    }

    #[test]
    fn newer_version_warns() {
        let supported = SceneVersion::new(2, 0, 0);
        let message = supported.check("3.0").unwrap();
        assert!(message.is_warning_or_worse());
        assert!(message.text.contains("3.0.0"));

        assert!(supported.check("2.0").is_none());
        assert!(supported.check("1.9").is_none());
        assert!(supported.check("garbage").is_none());
    }

    #[test]
    fn major_check_ignores_minor_bumps() {
        let supported = SceneVersion::new(2, 0, 0);
        assert!(supported.check_major("2.8").is_none());
        assert!(supported.check_major("Slicer3.6").is_some());
    }
}
