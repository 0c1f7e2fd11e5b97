//! Diagnostics with secret redaction
//!
//! Providers report push failures and other non-fatal conditions through a
//! [`DiagnosticSink`] rather than a return value, so a cache-write failure
//! can never fail a build that already succeeded locally. Every configured
//! secret (tokens, SAS strings) is scrubbed from messages before they reach
//! the log.

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Placeholder written over every occurrence of a configured secret
const REDACTED: &str = "*** (redacted)";

/// Message sink for provider diagnostics
///
/// Cheap to clone is not needed — the coordinator and push worker share one
/// instance behind an `Arc`.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    secrets: Vec<String>,
}

impl DiagnosticSink {
    /// Sink that redacts each of `secrets` from emitted messages.
    ///
    /// Empty strings are dropped — replacing the empty pattern would
    /// corrupt every message.
    pub fn new(secrets: Vec<String>) -> Self {
        Self {
            secrets: secrets.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    /// Scrub all configured secrets from a message
    pub fn redact(&self, message: &str) -> String {
        let mut out = message.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        out
    }

    /// Emit a warning, redacted
    pub fn warn(&self, message: &str) {
        warn!("{}", self.redact(message));
    }

    /// Emit an informational message, redacted
    pub fn info(&self, message: &str) {
        info!("{}", self.redact(message));
    }
}

/// Initialize logging for embedding binaries and tests.
///
/// Verbosity: 0 = warn, 1 = info, 2+ = debug. Respects `RUST_LOG` when the
/// caller has set it. Returns quietly if a subscriber is already installed.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "depot_cache=warn",
        1 => "depot_cache=info",
        _ => "depot_cache=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
