//! Cache coordination
//!
//! [`BinaryCache`] owns the ordered provider list, one [`CacheStatus`] per
//! package ABI seen during the run, and the asynchronous push worker. It
//! sequences provider queries so that no provider is asked a question it has
//! already answered, at most one real restore happens per ABI per run, and
//! uploads never block the build pipeline.

mod push;

pub use push::{PushRequest, PushStats};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::diagnostics::DiagnosticSink;
use crate::package::{BinaryPackageInfo, InstallAction, PackageAbi};
use crate::provider::{Availability, ProviderRegistry, RestoreStatus};
use crate::status::CacheStatus;
use push::PushWorker;

/// Coordinator for all configured cache backends
///
/// All query operations take `&mut self`: one caller drives them and the
/// status map is never touched by the push worker, so it needs no locking.
pub struct BinaryCache {
    registry: Arc<ProviderRegistry>,
    statuses: HashMap<PackageAbi, CacheStatus>,
    sink: Arc<DiagnosticSink>,
    worker: Option<PushWorker>,
}

impl BinaryCache {
    /// Build a cache over the given providers and spawn the push worker.
    pub fn new(registry: ProviderRegistry, sink: DiagnosticSink) -> Self {
        let registry = Arc::new(registry);
        let sink = Arc::new(sink);
        let worker = PushWorker::spawn(Arc::clone(&registry), Arc::clone(&sink));
        Self {
            registry,
            statuses: HashMap::new(),
            sink,
            worker: Some(worker),
        }
    }

    /// Replace the provider list.
    ///
    /// Intended for startup, before any query or push activity; status
    /// entries gathered against the old list would be meaningless.
    pub async fn install_providers(&mut self, registry: ProviderRegistry) {
        debug_assert!(
            self.statuses.is_empty(),
            "install_providers after query activity"
        );
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await;
        }
        self.statuses.clear();
        self.registry = Arc::new(registry);
        self.worker = Some(PushWorker::spawn(
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
        ));
    }

    /// Number of registered providers
    pub fn provider_count(&self) -> usize {
        self.registry.len()
    }

    /// Try to materialize one package from cache.
    ///
    /// Providers are asked in registration order; the first success wins
    /// and later providers are never asked. A provider fault is logged and
    /// treated as a miss. Once a package has been restored, further calls
    /// return immediately without touching any provider.
    ///
    /// Panics if the action carries no ABI — such actions can never be
    /// cached and reaching here with one is a caller bug.
    pub async fn try_restore(&mut self, action: &InstallAction) -> RestoreStatus {
        let abi = require_abi(action, "try_restore");
        let registry = Arc::clone(&self.registry);
        let status = self.statuses.entry(abi.clone()).or_default();

        if status.is_restored() {
            debug!("{} already restored this run", action.spec);
            return RestoreStatus::Restored;
        }

        for (id, provider) in registry.iter() {
            if !status.should_attempt_restore(id) {
                continue;
            }
            if !provider.access_mode().readable() {
                status.mark_unavailable(id);
                continue;
            }

            match provider.try_restore(action).await {
                Ok(RestoreStatus::Restored) => {
                    status.mark_available(id);
                    status.mark_restored();
                    debug!("restored {} via {}", action.spec, provider.name());
                    return RestoreStatus::Restored;
                }
                Ok(_) => status.mark_unavailable(id),
                Err(e) => {
                    self.sink.warn(&format!(
                        "provider {} failed restoring {}: {}",
                        provider.name(),
                        action.spec,
                        e
                    ));
                    status.mark_unavailable(id);
                }
            }
        }

        RestoreStatus::Unavailable
    }

    /// Batched restore across many actions.
    ///
    /// Equivalent to calling [`try_restore`](Self::try_restore) per action,
    /// but each provider sees the whole remaining batch in one call so it
    /// can issue one batched request instead of N serial ones. `slots` is a
    /// parallel output slice: entries for actions without an ABI are left
    /// untouched; every other entry ends up `Restored` or `Unavailable`.
    pub async fn prefetch(
        &mut self,
        actions: &[InstallAction],
        slots: &mut [Option<RestoreStatus>],
    ) {
        assert_eq!(
            actions.len(),
            slots.len(),
            "prefetch slots must parallel the action batch"
        );
        let registry = Arc::clone(&self.registry);

        // Fast path for packages already restored this run.
        for (action, slot) in actions.iter().zip(slots.iter_mut()) {
            if let Some(abi) = action.abi() {
                let status = self.statuses.entry(abi.clone()).or_default();
                if status.is_restored() {
                    *slot = Some(RestoreStatus::Restored);
                }
            }
        }

        for (id, provider) in registry.iter() {
            if !provider.access_mode().readable() {
                for action in actions {
                    if let Some(abi) = action.abi() {
                        self.statuses
                            .entry(abi.clone())
                            .or_default()
                            .mark_unavailable(id);
                    }
                }
                continue;
            }

            // The sub-batch this provider should still be asked about.
            let mut indices = Vec::new();
            let mut batch = Vec::new();
            for (i, action) in actions.iter().enumerate() {
                let Some(abi) = action.abi() else { continue };
                if matches!(slots[i], Some(RestoreStatus::Restored)) {
                    continue;
                }
                let status = self.statuses.entry(abi.clone()).or_default();
                if status.should_attempt_restore(id) {
                    indices.push(i);
                    batch.push(action.clone());
                }
            }
            if batch.is_empty() {
                continue;
            }

            let mut batch_slots = vec![None; batch.len()];
            provider.prefetch(&batch, &mut batch_slots).await;

            for (slot_idx, &i) in indices.iter().enumerate() {
                let abi = actions[i].abi().cloned().unwrap_or_else(|| unreachable!());
                let status = self.statuses.entry(abi).or_default();
                match batch_slots[slot_idx] {
                    Some(RestoreStatus::Restored) => {
                        status.mark_available(id);
                        status.mark_restored();
                        slots[i] = Some(RestoreStatus::Restored);
                    }
                    // An untouched slot means the provider could not say;
                    // same as an explicit miss.
                    _ => {
                        status.mark_unavailable(id);
                        slots[i] = Some(RestoreStatus::Unavailable);
                    }
                }
            }
        }

        // A slot can still be empty when every provider declined the ABI
        // before this call (or no provider is registered); that is a known
        // miss, not an unclassified action.
        for (action, slot) in actions.iter().zip(slots.iter_mut()) {
            if action.abi().is_some() && slot.is_none() {
                *slot = Some(RestoreStatus::Unavailable);
            }
        }
    }

    /// Batched existence-only check; never materializes files.
    ///
    /// Returns one classification per input action and records what was
    /// learned, so a later restore asks only the provider that answered
    /// "available". Panics if any action lacks an ABI: unlike `prefetch`,
    /// every action in a precheck batch must be cacheable.
    pub async fn precheck(&mut self, actions: &[InstallAction]) -> Vec<Availability> {
        for action in actions {
            require_abi(action, "precheck");
        }
        let registry = Arc::clone(&self.registry);

        for (id, provider) in registry.iter() {
            if !provider.access_mode().readable() {
                for action in actions {
                    if let Some(abi) = action.abi() {
                        self.statuses
                            .entry(abi.clone())
                            .or_default()
                            .mark_unavailable(id);
                    }
                }
                continue;
            }

            let mut indices = Vec::new();
            let mut batch = Vec::new();
            for (i, action) in actions.iter().enumerate() {
                let Some(abi) = action.abi() else { continue };
                let status = self.statuses.entry(abi.clone()).or_default();
                if status.should_attempt_precheck(id) {
                    indices.push(i);
                    batch.push(action.clone());
                }
            }
            if batch.is_empty() {
                continue;
            }

            let mut batch_slots = vec![None; batch.len()];
            provider.precheck(&batch, &mut batch_slots).await;

            for (slot_idx, &i) in indices.iter().enumerate() {
                let abi = actions[i].abi().cloned().unwrap_or_else(|| unreachable!());
                let status = self.statuses.entry(abi).or_default();
                match batch_slots[slot_idx] {
                    Some(Availability::Available) => status.mark_available(id),
                    _ => status.mark_unavailable(id),
                }
            }
        }

        actions
            .iter()
            .map(|action| {
                let known = action
                    .abi()
                    .and_then(|abi| self.statuses.get(abi))
                    .and_then(CacheStatus::available_provider);
                if known.is_some() {
                    Availability::Available
                } else {
                    Availability::Unavailable
                }
            })
            .collect()
    }

    /// Queue an upload of a just-built package and return immediately.
    ///
    /// Every writable provider will be offered the package by the worker,
    /// healing backends that missed it. `cleanup` requests removal of
    /// `package_dir` once the job completes. Fire-and-forget: failures
    /// surface only through the diagnostic sink.
    pub fn push_success(&self, action: &InstallAction, package_dir: &Path, cleanup: bool) {
        let Some(info) = BinaryPackageInfo::from_action(action) else {
            debug!("{} has no ABI, nothing to push", action.spec);
            return;
        };

        let request = PushRequest::new(info, package_dir.to_path_buf(), cleanup);
        let accepted = self
            .worker
            .as_ref()
            .map(|w| w.enqueue(request))
            .unwrap_or(false);
        if !accepted {
            warn!(
                "push of {} dropped: cache is shutting down",
                action.spec
            );
        }
    }

    /// Whether every registered provider has declined this ABI
    pub fn is_known_unavailable(&self, abi: &PackageAbi) -> bool {
        self.statuses
            .get(abi)
            .map(|s| s.is_unavailable(self.registry.len()))
            .unwrap_or(false)
    }

    /// Status recorded for an ABI, if it has been queried this run
    pub fn status(&self, abi: &PackageAbi) -> Option<&CacheStatus> {
        self.statuses.get(abi)
    }

    /// Stop accepting pushes, drain queued jobs FIFO, and join the worker.
    ///
    /// Must be called before dropping the cache if queued uploads matter;
    /// jobs still queued at abrupt termination are lost by design.
    pub async fn shutdown(&mut self) -> PushStats {
        match self.worker.take() {
            Some(worker) => worker.shutdown().await,
            None => PushStats::default(),
        }
    }
}

fn require_abi<'a>(action: &'a InstallAction, operation: &str) -> &'a PackageAbi {
    match action.abi() {
        Some(abi) => abi,
        None => panic!(
            "{} called on {} which has no ABI (caller bug)",
            operation, action.spec
        ),
    }
}
