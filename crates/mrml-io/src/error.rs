//! Error types for reader/writer dispatch
//!
//! "No handler" and "every handler declined" are not errors: the registry
//! reports them as an unsuccessful [`crate::IoOutcome`]. Errors cover caller
//! precondition violations and failures inside individual handlers.

use mrml_scene::SceneError;
use std::path::PathBuf;

/// IO error type
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Required property absent from the property bag
    #[error("missing required property: '{0}'")]
    MissingProperty(&'static str),

    /// Property present but unusable
    #[error("invalid property '{key}': {message}")]
    InvalidProperty {
        /// Property key
        key: String,
        /// What is wrong with the value
        message: String,
    },

    /// Handler looked at the request and declined it
    #[error("{handler} declined: {reason}")]
    Declined {
        /// Handler description
        handler: String,
        /// Why the handler declined
        reason: String,
    },

    /// Operation not implemented by the handler
    #[error("{operation} not supported by {handler}")]
    Unsupported {
        /// Handler description
        handler: String,
        /// Operation attempted (`load`, `save`)
        operation: &'static str,
    },

    /// IO error touching a file
    #[error("io error on {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content could not be interpreted
    #[error("parse error in {path}: {message}")]
    Parse {
        /// File being parsed
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// Extension pattern could not be compiled
    #[error("invalid extension pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Pattern text
        pattern: String,
        /// Compiler diagnostic
        message: String,
    },

    /// Scene rejected a mutation
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}

impl IoError {
    /// Whether this error is a caller contract violation
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingProperty(_) | Self::InvalidProperty { .. })
    }

    /// Create declined error
    pub fn declined(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Declined {
            handler: handler.into(),
            reason: reason.into(),
        }
    }

    /// Create unsupported-operation error
    pub fn unsupported(handler: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            handler: handler.into(),
            operation,
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create parse error for path
    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
