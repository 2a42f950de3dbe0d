//! Global error handling for treegen
//!
//! This module provides a centralized error type that can represent errors
//! from all modules in the project. Only configuration errors are meant to
//! stop a run; per-file problems are reported as diagnostics by the scanner.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while restoring a saved session
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The record was written by a newer (or otherwise incompatible) schema
    #[error("Session schema version {found} is not supported (supported: {supported})")]
    VersionMismatch {
        /// Version found in the record
        found: u64,
        /// Version this build understands
        supported: u32,
    },

    /// Required fields are missing or have the wrong shape
    #[error("Malformed session record: {0}")]
    MalformedRecord(String),
}

/// Raised by the source transformer when the lexer cannot make sense of a file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// A string literal is opened but never closed
    #[error("unterminated string literal starting on line {0}")]
    UnterminatedString(usize),

    /// A block comment is opened but never closed
    #[error("unterminated block comment starting on line {0}")]
    UnterminatedComment(usize),

    /// Unbalanced delimiters around a definition body
    #[error("unbalanced delimiters in definition starting on line {0}")]
    Unbalanced(usize),
}

/// Global error type for treegen operations
#[derive(Error, Debug)]
pub enum TreegenError {
    /// Configuration errors (fatal, raised before any walk)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A specific file could not be read
    #[error("Cannot access {path}: {source}")]
    FileAccess {
        /// Path of the file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Source transformation failures
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Session persistence errors
    #[error("Session error: {0}")]
    Persistence(#[from] PersistenceError),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl TreegenError {
    /// Whether the error comes from invalid user configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidArgument(_))
    }
}

/// Specialized Result type for treegen operations
pub type Result<T> = std::result::Result<T, TreegenError>;

/// Creates a TreegenError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::TreegenError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}
