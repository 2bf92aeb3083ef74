//! Catalog error types

use mrml_io::IoError;
use std::path::PathBuf;

/// Catalog error type
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Catalog file could not be read
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// Catalog file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Catalog content is malformed
    #[error("malformed catalog {path}: {message}")]
    Malformed {
        /// Catalog file
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },
}

impl CatalogError {
    /// Create malformed-catalog error
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<CatalogError> for IoError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Io { path, source } => IoError::io_error(path, source),
            CatalogError::Malformed { path, message } => IoError::parse_error(path, message),
        }
    }
}
