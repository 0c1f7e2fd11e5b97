//! Error types for depot-cache
//!
//! All modules use `DepotResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for depot-cache operations
pub type DepotResult<T> = Result<T, DepotError>;

/// All errors that can occur in the cache layer
#[derive(Error, Debug)]
pub enum DepotError {
    // Provider errors
    #[error("Provider {provider} failed during restore of {abi}: {reason}")]
    ProviderRestore {
        provider: String,
        abi: String,
        reason: String,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl DepotError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a provider restore error
    pub fn provider_restore(
        provider: impl Into<String>,
        abi: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ProviderRestore {
            provider: provider.into(),
            abi: abi.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a provider-level fault that the coordinator
    /// downgrades to a cache miss rather than propagating
    pub fn is_provider_fault(&self) -> bool {
        matches!(self, Self::ProviderRestore { .. })
    }
}
