//! Provider identity and the ordered provider registry
//!
//! Providers are identified by an opaque handle assigned at registration
//! time rather than by reference, so `CacheStatus` can record "this provider
//! has it" without borrowing the provider itself. Registration order defines
//! query priority for the lifetime of the registry.

use std::fmt;
use std::sync::Arc;

use super::BinaryProvider;

/// Stable handle for one registered provider
///
/// Valid only against the registry that issued it; handles are the
/// registration index, so first registered = lowest = first tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(usize);

impl ProviderId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider#{}", self.0)
    }
}

/// Ordered, immutable-after-construction list of cache backends
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn BinaryProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn BinaryProvider>>) -> Self {
        Self { providers }
    }

    /// No backends configured; every query is a miss and pushes are no-ops
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers in registration (priority) order with their handles
    pub fn iter(&self) -> impl Iterator<Item = (ProviderId, &Arc<dyn BinaryProvider>)> {
        self.providers
            .iter()
            .enumerate()
            .map(|(i, p)| (ProviderId::from_index(i), p))
    }

    /// Look up a provider by the handle this registry issued
    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn BinaryProvider>> {
        self.providers.get(id.index())
    }

    /// Providers whose access mode permits pushing, in registration order
    pub fn writable(&self) -> impl Iterator<Item = (ProviderId, &Arc<dyn BinaryProvider>)> {
        self.iter().filter(|(_, p)| p.access_mode().writable())
    }
}
