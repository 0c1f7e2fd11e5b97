//! Configuration loading and provider construction
//!
//! The surrounding package manager parses its provider-source specification
//! language into the [`CacheConfig`] shape; this module also reads that
//! shape from `cache.toml` directly for standalone use, and turns it into
//! the ordered provider registry the coordinator runs against.

pub mod schema;

pub use schema::{CacheConfig, ProviderSource};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::debug;

use crate::error::{DepotError, DepotResult};
use crate::provider::{BinaryProvider, FilesystemProvider, ProviderRegistry};

/// Loads and saves the cache configuration file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager over the default config path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Manager over a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Default config file path (`~/.config/depot/cache.toml`)
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depot")
            .join("cache.toml")
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load(&self) -> DepotResult<CacheConfig> {
        if !self.config_path.exists() {
            debug!("cache config not found, using defaults");
            return Ok(CacheConfig::default());
        }
        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> DepotResult<CacheConfig> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DepotError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| DepotError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &CacheConfig) -> DepotResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DepotError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DepotError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Instantiate the configured backends in priority order.
///
/// Registration order follows the config order, which defines query
/// priority for the life of the registry.
pub fn build_providers(config: &CacheConfig) -> DepotResult<ProviderRegistry> {
    let mut providers: Vec<Arc<dyn BinaryProvider>> = Vec::with_capacity(config.providers.len());
    for source in &config.providers {
        match source {
            ProviderSource::Files { path, mode } => {
                debug!("registering files provider at {}", path.display());
                providers.push(Arc::new(FilesystemProvider::new(path.clone(), *mode)));
            }
        }
    }
    Ok(ProviderRegistry::new(providers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AccessMode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("nonexistent.toml"));

        let config = manager.load().await.unwrap();
        assert!(config.providers.is_empty());
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("cache.toml"));

        let config = CacheConfig {
            providers: vec![ProviderSource::Files {
                path: temp.path().join("store"),
                mode: AccessMode::ReadWrite,
            }],
            secrets: vec!["hunter2".to_string()],
        };

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.providers, config.providers);
        assert_eq!(loaded.secrets, vec!["hunter2"]);
    }

    #[tokio::test]
    async fn invalid_toml_is_rejected_with_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.toml");
        tokio::fs::write(&path, "providers = 3").await.unwrap();

        let manager = ConfigManager::with_path(path.clone());
        let err = manager.load().await.unwrap_err();
        assert!(err.to_string().contains("cache.toml"));
    }

    #[test]
    fn build_providers_preserves_order() {
        let config = CacheConfig {
            providers: vec![
                ProviderSource::Files {
                    path: PathBuf::from("/first"),
                    mode: AccessMode::Read,
                },
                ProviderSource::Files {
                    path: PathBuf::from("/second"),
                    mode: AccessMode::ReadWrite,
                },
            ],
            secrets: Vec::new(),
        };

        let registry = build_providers(&config).unwrap();
        assert_eq!(registry.len(), 2);
        // Only the second source is writable.
        let writable: Vec<usize> = registry.writable().map(|(id, _)| id.index()).collect();
        assert_eq!(writable, vec![1]);
    }
}
