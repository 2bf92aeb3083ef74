//! User-visible messages collected during a load or save

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational
    Info,
    /// Load continued but the user should know
    Warning,
    /// Part of the request failed
    Error,
}

/// Message surfaced to the user after an IO request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    /// Severity
    pub severity: Severity,
    /// Text
    pub text: String,
}

impl UserMessage {
    /// Info message
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    /// Warning message
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    /// Error message
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }

    /// Whether severity is at least [`Severity::Warning`]
    #[inline]
    #[must_use]
    pub fn is_warning_or_worse(&self) -> bool {
        self.severity >= Severity::Warning
    }
}

impl Display for UserMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.text)
    }
}
