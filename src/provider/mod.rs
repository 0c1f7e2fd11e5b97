//! Cache backend abstraction
//!
//! Every cache backend — local directory, HTTP PUT/GET templates, feed-based
//! stores, cloud object stores — implements [`BinaryProvider`]. Lower-level
//! content-addressed stores implement [`ObjectProvider`] instead.
//!
//! Concurrency contract for implementers: the coordinator drives restore and
//! check operations from one task while the push worker calls `push` from
//! another, always for *different* packages. Providers must tolerate that
//! concurrent-but-disjoint-key usage; they never see two operations for the
//! same ABI at once.

mod filesystem;
mod registry;

pub use filesystem::FilesystemProvider;
pub use registry::{ProviderId, ProviderRegistry};

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::diagnostics::DiagnosticSink;
use crate::error::DepotResult;
use crate::package::{BinaryPackageInfo, InstallAction};

/// Which operations a backend permits
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Restore/check only
    Read,
    /// Push only
    Write,
    /// Both
    ReadWrite,
}

impl AccessMode {
    /// Whether restore/precheck/download are permitted
    pub fn readable(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether push/upload are permitted
    pub fn writable(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Outcome of a restore attempt
///
/// Open enumeration: backends may grow more detailed outcomes, but every
/// consumer must treat anything that is not `Restored` as a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RestoreStatus {
    /// The package's files are now on local disk
    Restored,
    /// The backend does not have this package (or could not say)
    Unavailable,
}

/// Outcome of an existence-only check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Availability {
    /// The backend holds this package
    Available,
    /// The backend does not hold this package (or could not say)
    Unavailable,
}

/// Abstract cache backend interface
///
/// Batch operations receive the whole action batch plus a parallel slot per
/// action. Implementations mutate each slot in place and must leave slots
/// untouched for actions without an ABI.
#[async_trait]
pub trait BinaryProvider: Send + Sync {
    /// Human-readable backend name for diagnostics
    fn name(&self) -> &str;

    /// Which operations this backend permits
    fn access_mode(&self) -> AccessMode {
        AccessMode::ReadWrite
    }

    /// Attempt to materialize one package's files into its install directory.
    ///
    /// The action is guaranteed to carry an ABI. A hard backend error is
    /// equivalent to `Unavailable` for the caller; returning it as an error
    /// lets the coordinator log the fault before degrading it to a miss.
    async fn try_restore(&self, action: &InstallAction) -> DepotResult<RestoreStatus>;

    /// Batched restore across many actions in one pass.
    ///
    /// Backends with a batched wire operation (one feed query covering many
    /// package ids) should override this; the default falls back to serial
    /// `try_restore` calls.
    async fn prefetch(&self, actions: &[InstallAction], slots: &mut [Option<RestoreStatus>]) {
        debug_assert_eq!(actions.len(), slots.len());
        for (action, slot) in actions.iter().zip(slots.iter_mut()) {
            if action.abi().is_none() {
                continue;
            }
            let outcome = self
                .try_restore(action)
                .await
                .unwrap_or(RestoreStatus::Unavailable);
            *slot = Some(outcome);
        }
    }

    /// Batched existence-only check. Must not materialize any files.
    async fn precheck(&self, actions: &[InstallAction], slots: &mut [Option<Availability>]);

    /// Upload a just-built package.
    ///
    /// Failures are reported through `sink` and never returned: a cache
    /// write failing must not fail a build that already succeeded.
    async fn push(&self, info: &BinaryPackageInfo, package_dir: &Path, sink: &DiagnosticSink);
}

/// Content address of one stored object (hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Address of the given content
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Wrap an already-computed hex digest
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-level contract for content-addressed object stores
///
/// `download` and `check_availability` take batches of object ids to
/// amortize round-trips, for the same reason `prefetch`/`precheck` batch
/// install actions. [`AccessMode`] gates which operations may be called.
#[async_trait]
pub trait ObjectProvider: Send + Sync {
    /// Human-readable backend name for diagnostics
    fn name(&self) -> &str;

    /// Which operations this store permits
    fn access_mode(&self) -> AccessMode;

    /// Fetch each object into the destination path at the same index.
    ///
    /// `results[i]` is set true iff `objects[i]` was fully written to
    /// `dests[i]`. Slots for objects the store lacks are set false.
    async fn download(&self, objects: &[ObjectId], dests: &[&Path], results: &mut [bool]);

    /// Store one object from a local file.
    ///
    /// Failures go to `sink`, mirroring [`BinaryProvider::push`].
    async fn upload(&self, object: &ObjectId, source: &Path, sink: &DiagnosticSink);

    /// Existence check for a batch of objects, one flag per input id
    async fn check_availability(&self, objects: &[ObjectId], results: &mut [bool]);
}
