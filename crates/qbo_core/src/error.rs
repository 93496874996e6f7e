//! Error types shared by every stage of the import pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while importing an OBJ or QBO asset.
///
/// Every variant that refers to a file carries its path so messages can be
/// shown to the user without extra context.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Cannot open '{}': {}", .path.display(), .source)]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{}: file corrupt: {}", .path.display(), .line, .message)]
    FileCorrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{}: invalid data: {}", .path.display(), .line, .message)]
    InvalidData {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Importer bug: {0}")]
    Bug(String),
}

impl ImportError {
    /// Returns true for structural violations in the file contents.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, ImportError::FileCorrupt { .. })
    }
}

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;
