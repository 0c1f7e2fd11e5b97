//! Local-directory cache backend
//!
//! The simplest real backend: one directory per package ABI, sharded by the
//! first two hex characters to keep directory fan-out manageable. Each entry
//! holds the package tree under `contents/` plus a `manifest.json` snapshot
//! of the build that produced it. The manifest is written last, so its
//! presence marks a complete entry; restore and precheck key off it.
//!
//! ```text
//! <root>/ab/ab12...ef/
//!   contents/...      package tree
//!   manifest.json     BinaryPackageInfo, written last
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::diagnostics::DiagnosticSink;
use crate::error::{DepotError, DepotResult};
use crate::package::{BinaryPackageInfo, InstallAction, PackageAbi};
use crate::provider::{AccessMode, Availability, BinaryProvider, RestoreStatus};

const CONTENTS_DIR: &str = "contents";
const MANIFEST_FILE: &str = "manifest.json";

/// Cache backend over a local (or network-mounted) directory
pub struct FilesystemProvider {
    root: PathBuf,
    mode: AccessMode,
}

impl FilesystemProvider {
    pub fn new(root: impl Into<PathBuf>, mode: AccessMode) -> Self {
        Self {
            root: root.into(),
            mode,
        }
    }

    /// Directory holding one ABI's entry
    fn entry_dir(&self, abi: &PackageAbi) -> PathBuf {
        let key = abi.as_str();
        let shard = if key.len() >= 2 { &key[..2] } else { key };
        self.root.join(shard).join(key)
    }

    async fn entry_is_complete(&self, abi: &PackageAbi) -> bool {
        fs::try_exists(self.entry_dir(abi).join(MANIFEST_FILE))
            .await
            .unwrap_or(false)
    }
}

#[async_trait]
impl BinaryProvider for FilesystemProvider {
    fn name(&self) -> &str {
        "files"
    }

    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    async fn try_restore(&self, action: &InstallAction) -> DepotResult<RestoreStatus> {
        if !self.mode.readable() {
            return Ok(RestoreStatus::Unavailable);
        }
        let abi = match action.abi() {
            Some(abi) => abi,
            None => return Ok(RestoreStatus::Unavailable),
        };

        if !self.entry_is_complete(abi).await {
            return Ok(RestoreStatus::Unavailable);
        }

        let contents = self.entry_dir(abi).join(CONTENTS_DIR);
        copy_tree(&contents, &action.install_dir).await?;
        debug!("restored {} from {}", action.spec, self.root.display());
        Ok(RestoreStatus::Restored)
    }

    async fn precheck(&self, actions: &[InstallAction], slots: &mut [Option<Availability>]) {
        debug_assert_eq!(actions.len(), slots.len());
        for (action, slot) in actions.iter().zip(slots.iter_mut()) {
            let abi = match action.abi() {
                Some(abi) => abi,
                None => continue,
            };
            let available = self.mode.readable() && self.entry_is_complete(abi).await;
            *slot = Some(if available {
                Availability::Available
            } else {
                Availability::Unavailable
            });
        }
    }

    async fn push(&self, info: &BinaryPackageInfo, package_dir: &Path, sink: &DiagnosticSink) {
        if !self.mode.writable() {
            sink.warn(&format!(
                "files provider at {} is read-only, skipping push of {}",
                self.root.display(),
                info.spec
            ));
            return;
        }

        if let Err(e) = self.write_entry(info, package_dir).await {
            sink.warn(&format!(
                "failed to push {} to {}: {}",
                info.spec,
                self.root.display(),
                e
            ));
        } else {
            debug!("pushed {} to {}", info.spec, self.root.display());
        }
    }
}

impl FilesystemProvider {
    async fn write_entry(&self, info: &BinaryPackageInfo, package_dir: &Path) -> DepotResult<()> {
        let entry = self.entry_dir(&info.abi);

        // Re-pushing an existing complete entry is a no-op; content for a
        // given ABI never changes.
        if self.entry_is_complete(&info.abi).await {
            return Ok(());
        }

        // A partial entry from a previous crashed push is discarded.
        if fs::try_exists(&entry).await.unwrap_or(false) {
            fs::remove_dir_all(&entry)
                .await
                .map_err(|e| DepotError::io(format!("clearing partial entry {}", entry.display()), e))?;
        }

        copy_tree(package_dir, &entry.join(CONTENTS_DIR)).await?;

        let manifest = serde_json::to_vec_pretty(info)?;
        fs::write(entry.join(MANIFEST_FILE), manifest)
            .await
            .map_err(|e| DepotError::io(format!("writing manifest in {}", entry.display()), e))?;
        Ok(())
    }
}

/// Recursively copy a directory tree. Iterative to stay off the async
/// recursion path; symlinks are followed like regular files.
async fn copy_tree(src: &Path, dst: &Path) -> DepotResult<()> {
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to)
            .await
            .map_err(|e| DepotError::io(format!("creating {}", to.display()), e))?;

        let mut entries = fs::read_dir(&from)
            .await
            .map_err(|e| DepotError::io(format!("reading {}", from.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DepotError::io(format!("reading {}", from.display()), e))?
        {
            let target = to.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| DepotError::io(format!("stat {}", entry.path().display()), e))?;

            if file_type.is_dir() {
                pending.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), &target)
                    .await
                    .map_err(|e| DepotError::io(format!("copying to {}", target.display()), e))?;
            }
        }
    }

    Ok(())
}
