//! Package identity and install-action data types
//!
//! These are produced by the resolver and build pipeline (external to this
//! crate) and consumed here immutably. The ABI hash itself is computed
//! upstream; this layer only uses it as an opaque cache key.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Opaque key identifying one exact build configuration of a package
/// (port, triplet, feature set, compiler identity).
///
/// Computed externally from the package's inputs; two actions with the same
/// ABI are interchangeable as cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageAbi(String);

impl PackageAbi {
    pub fn new(abi: impl Into<String>) -> Self {
        Self(abi.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageAbi {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A package name plus the triplet it is built for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package (port) name
    pub name: String,

    /// Target platform/architecture/toolchain identifier
    pub triplet: String,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, triplet: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triplet: triplet.into(),
        }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.triplet)
    }
}

/// One unit of work from the resolver: build (or restore) this package
///
/// The ABI is optional — a "head" build pinned to a working tree has no
/// stable configuration hash and can never be cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallAction {
    /// What to install
    pub spec: PackageSpec,

    /// Cache key, when the configuration is hashable
    pub abi: Option<PackageAbi>,

    /// Resolved package version
    pub version: String,

    /// Feature set this configuration was resolved with
    pub features: Vec<String>,

    /// Direct dependencies as `name:triplet` strings
    pub dependencies: Vec<String>,

    /// Compiler identity, when known (e.g. "clang")
    pub compiler_id: Option<String>,

    /// Compiler version, when known
    pub compiler_version: Option<String>,

    /// Where a restore materializes this package's files. Opaque to the
    /// cache layer; the layout below it is owned by the packaging system.
    pub install_dir: PathBuf,
}

impl InstallAction {
    /// Minimal action for the common case; richer fields default to empty
    pub fn new(spec: PackageSpec, abi: Option<PackageAbi>, version: impl Into<String>) -> Self {
        Self {
            spec,
            abi,
            version: version.into(),
            features: Vec::new(),
            dependencies: Vec::new(),
            compiler_id: None,
            compiler_version: None,
            install_dir: PathBuf::new(),
        }
    }

    /// Set the directory a restore materializes into
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    pub fn abi(&self) -> Option<&PackageAbi> {
        self.abi.as_ref()
    }
}

/// Immutable snapshot of a completed install action, taken at push time
///
/// Carries everything a richer backend needs to materialize a manifest
/// alongside the blob (feed-based stores want version, dependencies, and
/// toolchain identity, not just the bits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryPackageInfo {
    pub abi: PackageAbi,
    pub spec: PackageSpec,
    pub version: String,
    pub features: Vec<String>,
    pub dependencies: Vec<String>,
    pub compiler_id: Option<String>,
    pub compiler_version: Option<String>,
}

impl BinaryPackageInfo {
    /// Snapshot an action that has just been built locally.
    ///
    /// Returns `None` when the action carries no ABI — such a build is not
    /// cacheable and there is nothing to push.
    pub fn from_action(action: &InstallAction) -> Option<Self> {
        let abi = action.abi.clone()?;
        Some(Self {
            abi,
            spec: action.spec.clone(),
            version: action.version.clone(),
            features: action.features.clone(),
            dependencies: action.dependencies.clone(),
            compiler_id: action.compiler_id.clone(),
            compiler_version: action.compiler_version.clone(),
        })
    }
}
