//! Asynchronous push subsystem
//!
//! `push_success` must never block the build pipeline on a cache write, so
//! queued uploads go over an unbounded single-consumer channel to one worker
//! task. The worker drains jobs strictly FIFO and offers each to every
//! writable provider, not just the one (if any) that originally served a
//! restore — a backend that missed this package gets backfilled, keeping
//! backends eventually consistent with each other.
//!
//! Jobs queued at abrupt process termination are lost; only a graceful
//! [`shutdown`](PushWorker::shutdown) drains the queue.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::diagnostics::DiagnosticSink;
use crate::package::BinaryPackageInfo;
use crate::provider::ProviderRegistry;

/// One queued upload
///
/// Ownership moves from the caller into the channel and then into the
/// worker; it is never shared.
#[derive(Debug)]
pub struct PushRequest {
    /// Correlation id for log lines about this job
    pub job_id: Uuid,

    /// Snapshot of the build that produced the package
    pub info: BinaryPackageInfo,

    /// Directory holding the built package tree to upload
    pub package_dir: PathBuf,

    /// Remove `package_dir` after the job completes
    pub cleanup_after: bool,

    /// When the job was enqueued
    pub queued_at: DateTime<Utc>,
}

impl PushRequest {
    pub fn new(info: BinaryPackageInfo, package_dir: PathBuf, cleanup_after: bool) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            info,
            package_dir,
            cleanup_after,
            queued_at: Utc::now(),
        }
    }
}

/// Counters reported when the worker drains and exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    /// Jobs dequeued and processed
    pub jobs: usize,

    /// Individual provider pushes attempted across all jobs
    pub provider_pushes: usize,
}

/// Handle to the single push worker task
pub(crate) struct PushWorker {
    tx: Option<mpsc::UnboundedSender<PushRequest>>,
    handle: JoinHandle<PushStats>,
}

impl PushWorker {
    /// Spawn the worker. It holds the registry read-only and shares the
    /// diagnostic sink with the coordinator.
    pub(crate) fn spawn(registry: Arc<ProviderRegistry>, sink: Arc<DiagnosticSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, registry, sink));
        Self {
            tx: Some(tx),
            handle,
        }
    }

    /// Queue one job. Unbounded send: never blocks, never touches I/O.
    ///
    /// Returns false if the worker has already been shut down.
    pub(crate) fn enqueue(&self, request: PushRequest) -> bool {
        match &self.tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs, let the worker drain what is queued, and join it.
    pub(crate) async fn shutdown(mut self) -> PushStats {
        // Closing the sender ends the worker's recv loop after the
        // already-buffered jobs are delivered.
        self.tx.take();
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("push worker task failed: {}", e);
                PushStats::default()
            }
        }
    }
}

/// Worker loop: strictly FIFO, one job at a time.
async fn run(
    mut rx: mpsc::UnboundedReceiver<PushRequest>,
    registry: Arc<ProviderRegistry>,
    sink: Arc<DiagnosticSink>,
) -> PushStats {
    let mut stats = PushStats::default();

    while let Some(job) = rx.recv().await {
        debug!(
            "push job {} for {} dequeued (queued at {})",
            job.job_id, job.info.spec, job.queued_at
        );

        for (id, provider) in registry.writable() {
            provider.push(&job.info, &job.package_dir, &sink).await;
            debug!("push job {}: offered to {} ({})", job.job_id, provider.name(), id);
            stats.provider_pushes += 1;
        }

        if job.cleanup_after {
            if let Err(e) = tokio::fs::remove_dir_all(&job.package_dir).await {
                sink.warn(&format!(
                    "failed to clean up {} after push: {}",
                    job.package_dir.display(),
                    e
                ));
            }
        }

        stats.jobs += 1;
    }

    info!(
        "push worker drained: {} jobs, {} provider pushes",
        stats.jobs, stats.provider_pushes
    );
    stats
}
