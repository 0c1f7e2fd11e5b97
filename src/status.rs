//! Per-package availability state machine
//!
//! One `CacheStatus` exists per distinct package ABI seen during a run. It
//! records what the coordinator has learned about that package across all
//! registered providers so no provider is asked the same question twice.
//!
//! Knowledge is monotonic: `Unknown → Available → Restored`, never backward.
//! Restored is terminal for the run.

use std::collections::HashSet;

use crate::provider::ProviderId;

/// What the coordinator knows about one package ABI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// No provider has confirmed the package yet. Providers that have
    /// answered "no" are recorded so they are never re-asked.
    Unknown { unavailable: HashSet<ProviderId> },

    /// Exactly one provider has confirmed it holds the package.
    Available(ProviderId),

    /// The package's files are on local disk, restored via this provider.
    Restored(ProviderId),
}

impl CacheStatus {
    /// Fresh status: nothing known, nobody asked
    pub fn new() -> Self {
        Self::Unknown {
            unavailable: HashSet::new(),
        }
    }

    /// Whether an existence-only query should be sent to `provider`.
    ///
    /// Only while the package is still unknown, and only if this provider
    /// has not already declined.
    pub fn should_attempt_precheck(&self, provider: ProviderId) -> bool {
        match self {
            Self::Unknown { unavailable } => !unavailable.contains(&provider),
            Self::Available(_) | Self::Restored(_) => false,
        }
    }

    /// Whether a restore should be sent to `provider`.
    ///
    /// While unknown this behaves like [`should_attempt_precheck`]; once a
    /// provider is known to have the package, only that provider is asked
    /// to actually transfer it.
    ///
    /// [`should_attempt_precheck`]: Self::should_attempt_precheck
    pub fn should_attempt_restore(&self, provider: ProviderId) -> bool {
        match self {
            Self::Unknown { unavailable } => !unavailable.contains(&provider),
            Self::Available(id) => *id == provider,
            Self::Restored(_) => false,
        }
    }

    /// True once every one of the `total_providers` registered providers
    /// has declined: the package is absent from the whole cache.
    pub fn is_unavailable(&self, total_providers: usize) -> bool {
        match self {
            Self::Unknown { unavailable } => unavailable.len() == total_providers,
            Self::Available(_) | Self::Restored(_) => false,
        }
    }

    /// The provider confirmed to have the package, if any
    pub fn available_provider(&self) -> Option<ProviderId> {
        match self {
            Self::Unknown { .. } => None,
            Self::Available(id) | Self::Restored(id) => Some(*id),
        }
    }

    /// Whether the package's files are already on local disk
    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored(_))
    }

    /// Record that `provider` does not have the package.
    ///
    /// No-op once the package is known to be available somewhere — presence
    /// knowledge is never retracted.
    pub fn mark_unavailable(&mut self, provider: ProviderId) {
        if let Self::Unknown { unavailable } = self {
            unavailable.insert(provider);
        }
    }

    /// Record that `provider` has the package.
    ///
    /// Providers are queried sequentially and the first positive answer
    /// stops the search, so a second call with a different provider is a
    /// caller bug: it asserts in debug builds and is otherwise a no-op.
    pub fn mark_available(&mut self, provider: ProviderId) {
        match self {
            Self::Unknown { .. } => *self = Self::Available(provider),
            Self::Available(id) | Self::Restored(id) => {
                debug_assert_eq!(
                    *id, provider,
                    "package already recorded as available at a different provider"
                );
            }
        }
    }

    /// Record that the package's files have been materialized on disk.
    ///
    /// Only meaningful from `Available`; restoring without a recorded
    /// provider is a caller bug.
    pub fn mark_restored(&mut self) {
        match self {
            Self::Available(id) => *self = Self::Restored(*id),
            Self::Restored(_) => {}
            Self::Unknown { .. } => {
                debug_assert!(false, "mark_restored without a recorded provider");
            }
        }
    }
}

impl Default for CacheStatus {
    fn default() -> Self {
        Self::new()
    }
}
