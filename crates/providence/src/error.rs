//! Error types for providence.
//!
//! This module defines all error types used throughout the providence crate.
//! Only two of them occur during playback: a profile lookup miss, which aborts
//! the run, and a failed placeholder fetch, which is recovered locally.

use thiserror::Error;

/// The main error type for providence operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Playback Errors ===
    /// A profile id was not present in the store.
    #[error("profile not found: {id}")]
    ProfileNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A placeholder asset could not be fetched or decoded.
    #[error("failed to fetch asset '{key}': {message}")]
    AssetFetchFailed {
        /// The asset key that was requested.
        key: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Data Errors ===
    /// Two profile records share an id.
    #[error("duplicate profile id: {id}")]
    DuplicateProfile {
        /// The repeated id.
        id: String,
    },

    /// A script failed validation.
    #[error("invalid script: {message}")]
    ScriptValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A message template could not be rendered.
    #[error("invalid template '{template}': {message}")]
    Template {
        /// The offending template.
        template: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or terminal output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for providence operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a profile-not-found error.
    #[must_use]
    pub fn profile_not_found(id: impl Into<String>) -> Self {
        Self::ProfileNotFound { id: id.into() }
    }

    /// Create an asset fetch error.
    #[must_use]
    pub fn asset_fetch_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AssetFetchFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a script validation error.
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::ScriptValidation {
            message: message.into(),
        }
    }

    /// Create a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a profile lookup miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProfileNotFound { .. })
    }

    /// Check if playback can continue past this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AssetFetchFailed { .. })
    }
}
