//! Error types for captail
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! The taxonomy matters operationally: configuration and authentication
//! failures are fatal and abort startup, a server-side cursor invalidation
//! is an expected event resolved by reopening, and everything else is
//! scoped to a single polling iteration.

// TODO: document individual variants before 1.0
#![allow(missing_docs)]

use thiserror::Error;

/// The main error type for captail
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Source Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Collection '{collection}' not found: node = {node}")]
    CollectionNotFound { collection: String, node: String },

    #[error("Collection '{collection}' is not capped: node = {node}")]
    NotCapped { collection: String, node: String },

    #[error("Tailable cursor invalidated: {message}")]
    CursorInvalidated { message: String },

    #[error("Source error: {message}")]
    Source { message: String },

    // ============================================================================
    // Checkpoint Errors
    // ============================================================================
    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },

    #[error("Invalid record identifier: {value}")]
    InvalidRecordId { value: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a cursor-invalidated error
    pub fn cursor_invalidated(message: impl Into<String>) -> Self {
        Self::CursorInvalidated {
            message: message.into(),
        }
    }

    /// Create a source error
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
        }
    }

    /// Check if this error means the underlying tailable cursor went stale
    /// server-side and can be resolved by reopening it
    pub fn is_cursor_invalidated(&self) -> bool {
        matches!(self, Error::CursorInvalidated { .. })
    }

    /// Check if this error is fatal at startup (aborts before the engine
    /// enters its running state)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::Auth { .. }
                | Error::CollectionNotFound { .. }
                | Error::NotCapped { .. }
        )
    }
}

/// Result type alias for captail
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
