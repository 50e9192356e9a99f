use std::{path::PathBuf, result};

use thiserror::Error;

use crate::store::ValueFormat;

/// Error types for module lookups, decoding and reloads.
///
/// `NotFound` is an ordinary outcome and is never logged by this crate;
/// everything else is either surfaced through the `*_err` getters or logged
/// by the fallback getter shapes.
#[derive(Error, Debug)]
pub enum ConfError {
    /// The path has no value in the current snapshot
    #[error("path '{path}' not found")]
    NotFound {
        /// The requested path
        path: String,
    },

    /// The stored type tag disagrees with the requested decode
    #[error("format mismatch at '{path}': expected {expected}, got {actual}")]
    FormatMismatch {
        /// The requested path
        path: String,
        /// Format required by the decoder
        expected: ValueFormat,
        /// Format found in the record
        actual: ValueFormat,
    },

    /// The stored value is too short to carry a type tag
    #[error("corrupt record at '{path}': value has no type tag")]
    CorruptRecord {
        /// The requested path
        path: String,
    },

    /// The hash index of a loaded database points outside the file
    #[error("corrupt index: {details}")]
    CorruptIndex {
        /// What was found to be out of bounds
        details: String,
    },

    /// The backing file is missing, unreadable or has an invalid index
    #[error("failed to open '{path}': {details}")]
    Open {
        /// Path of the backing file
        path: PathBuf,
        /// Underlying failure
        details: String,
    },

    /// The value is present with the right tag but cannot be parsed
    #[error("failed to decode '{path}' as {expected}: {details}")]
    Decode {
        /// The requested path
        path: String,
        /// Name of the requested type
        expected: &'static str,
        /// Parser error details
        details: String,
    },

    /// The file watcher could not be started or could not watch a directory
    #[error("file watcher error for '{path}': {details}")]
    Watch {
        /// Directory being registered
        path: PathBuf,
        /// Watcher error details
        details: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = result::Result<T, ConfError>;

impl ConfError {
    /// Creates an open failure for `path` from any displayable cause.
    pub fn open(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        ConfError::Open {
            path: path.into(),
            details: error.to_string(),
        }
    }

    /// Creates a decode failure for `path`.
    pub fn decode(path: &str, expected: &'static str, error: impl std::fmt::Display) -> Self {
        ConfError::Decode {
            path: path.to_string(),
            expected,
            details: error.to_string(),
        }
    }

    /// Returns true for the expected "no such path" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfError::NotFound { .. })
    }
}
