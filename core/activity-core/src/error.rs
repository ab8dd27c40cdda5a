//! Error types for activity-core operations.

use std::path::PathBuf;

/// All errors that can occur while recording hook activity.
///
/// The hook binary never lets these reach the host; they exist so each
/// operation reports what went wrong and the boundary can decide to drop it.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    Config { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HookError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        HookError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        HookError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using HookError.
pub type Result<T> = std::result::Result<T, HookError>;
