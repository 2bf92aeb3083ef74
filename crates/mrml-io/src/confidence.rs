//! Confidence scoring for handler selection
//!
//! Extension patterns are `*`-globs matched case-insensitively against the
//! file name component. A matched pattern scores by the length of its literal
//! suffix, so `*.nii.gz` outranks `*.gz`. Handlers that recognize content may
//! refine the score with [`sniff_header`] and [`header_adjusted_confidence`].

use crate::error::IoError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Confidence of a pattern with an empty literal suffix
pub const BASE_CONFIDENCE: f64 = 0.5;

/// Confidence gained per literal suffix character
pub const SUFFIX_STEP: f64 = 0.01;

/// Upper bound for extension-derived confidence
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Lower bound once a handler recognized its header
pub const HEADER_MATCH_CONFIDENCE: f64 = 0.6;

/// Upper bound when the extension matched but the header did not
pub const HEADER_MISS_CONFIDENCE: f64 = 0.4;

/// Bytes inspected by [`sniff_header`]
pub const SNIFF_WINDOW: usize = 1024;

/// Patterns compiled so far, keyed by pattern text
static PATTERN_CACHE: Lazy<RwLock<HashMap<String, ExtensionPattern>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compiled extension pattern
#[derive(Debug, Clone)]
pub struct ExtensionPattern {
    raw: String,
    regex: Regex,
    suffix: String,
}

impl ExtensionPattern {
    /// Compile a `*`-glob
    ///
    /// # Errors
    /// Returns [`IoError::InvalidPattern`] for an empty pattern
    pub fn parse(pattern: &str) -> Result<Self, IoError> {
        if pattern.is_empty() {
            return Err(IoError::InvalidPattern {
                pattern: String::new(),
                message: "empty pattern".to_string(),
            });
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("(?is)^{body}$")).map_err(|e| IoError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let suffix = pattern
            .rsplit_once('*')
            .map_or(pattern, |(_, tail)| tail)
            .to_string();

        Ok(Self {
            raw: pattern.to_string(),
            regex,
            suffix,
        })
    }

    /// Compile a `*`-glob once per process and reuse it afterwards
    ///
    /// # Errors
    /// Same as [`ExtensionPattern::parse`]; failures are not cached
    pub fn cached(pattern: &str) -> Result<Self, IoError> {
        if let Some(compiled) = PATTERN_CACHE.read().get(pattern) {
            return Ok(compiled.clone());
        }
        let compiled = Self::parse(pattern)?;
        PATTERN_CACHE
            .write()
            .insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Pattern text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Literal text after the last `*`
    #[inline]
    #[must_use]
    pub fn literal_suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether the pattern accepts any file name (`*`, `*.*`)
    #[inline]
    #[must_use]
    pub fn is_generic(&self) -> bool {
        matches!(self.raw.as_str(), "*" | "*.*")
    }

    /// Whether the file name component of `path` matches
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy());
        self.regex.is_match(&name)
    }

    /// Confidence when matched
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn base_confidence(&self) -> f64 {
        let chars = self.suffix.chars().count() as f64;
        (BASE_CONFIDENCE + SUFFIX_STEP * chars).min(MAX_CONFIDENCE)
    }
}

fn compile_all(patterns: &[String]) -> impl Iterator<Item = ExtensionPattern> + '_ {
    patterns.iter().filter_map(|p| match ExtensionPattern::cached(p) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            tracing::warn!(pattern = %p, error = %e, "Skipping extension pattern");
            None
        }
    })
}

/// Whether any pattern matches
#[must_use]
pub fn matches_any(patterns: &[String], path: &Path) -> bool {
    compile_all(patterns).any(|p| p.matches(path))
}

/// Whether any pattern is a catch-all
#[must_use]
pub fn has_generic(patterns: &[String]) -> bool {
    compile_all(patterns).any(|p| p.is_generic())
}

/// Highest base confidence among matching patterns, `0.0` when none match
#[must_use]
pub fn extension_confidence(patterns: &[String], path: &Path) -> f64 {
    compile_all(patterns)
        .filter(|p| p.matches(path))
        .map(|p| p.base_confidence())
        .fold(0.0, f64::max)
}

/// Whether `magic` occurs in the first [`SNIFF_WINDOW`] bytes of the file
///
/// Unreadable files count as not matching.
#[must_use]
pub fn sniff_header(path: &Path, magic: &[u8]) -> bool {
    if magic.is_empty() {
        return true;
    }

    let mut buffer = Vec::with_capacity(SNIFF_WINDOW);
    let read = File::open(path).and_then(|file| {
        file.take(SNIFF_WINDOW as u64).read_to_end(&mut buffer)
    });
    if let Err(e) = read {
        tracing::debug!(path = %path.display(), error = %e, "Header sniff failed");
        return false;
    }

    buffer.windows(magic.len()).any(|window| window == magic)
}

/// Refine an extension confidence with a header check
///
/// A zero confidence stays zero: the header only matters once the extension
/// matched.
#[must_use]
pub fn header_adjusted_confidence(base: f64, header_found: bool) -> f64 {
    if base <= 0.0 {
        0.0
    } else if header_found {
        base.max(HEADER_MATCH_CONFIDENCE)
    } else {
        base.min(HEADER_MISS_CONFIDENCE)
    }
}
