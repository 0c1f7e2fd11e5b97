//! Configuration schema for the cache layer
//!
//! Mirrors the shape produced by the package manager's provider-source
//! parser: an ordered list of backend sources (order = query priority) plus
//! the secrets to scrub from diagnostics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::provider::AccessMode;

/// Root cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend sources in query-priority order
    pub providers: Vec<ProviderSource>,

    /// Opaque strings to redact from any diagnostic output
    pub secrets: Vec<String>,
}

/// One configured backend source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderSource {
    /// Local (or network-mounted) directory backend
    Files {
        path: PathBuf,
        #[serde(default = "default_mode")]
        mode: AccessMode,
    },
}

fn default_mode() -> AccessMode {
    AccessMode::ReadWrite
}
