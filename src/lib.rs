//! depot-cache - Binary artifact cache layer
//!
//! Avoids rebuilding packages the Depot package manager has already built
//! somewhere: restore from, check against, and publish to an ordered set of
//! pluggable cache backends, keyed by the package's ABI hash.

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod package;
pub mod provider;
pub mod status;

pub use cache::BinaryCache;
pub use error::{DepotError, DepotResult};
