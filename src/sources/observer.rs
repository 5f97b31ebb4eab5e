//! Per-session observability hooks.

use crate::models::Identifier;
use crate::sources::SourceError;

/// Receives events from a download session.
///
/// All methods default to doing nothing, so an implementation only overrides
/// what it cares about. Sessions use [`TracingObserver`] unless given another.
pub trait SessionObserver: Send + Sync + std::fmt::Debug {
    /// The session dropped `from` and moved on to `to` (`None` when exhausted)
    fn mirror_rotated(&self, _from: &str, _to: Option<&str>) {}

    /// A fetch attempt failed
    fn attempt_failed(&self, _identifier: &Identifier, _attempt: u32, _error: &SourceError) {}

    /// A direct PDF link was found
    fn resolved(&self, _identifier: &Identifier, _url: &str) {}
}

/// Emits session events as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn mirror_rotated(&self, from: &str, to: Option<&str>) {
        match to {
            Some(to) => tracing::info!(from, to, "Changing mirror"),
            None => tracing::error!(from, "Ran out of mirrors"),
        }
    }

    fn attempt_failed(&self, identifier: &Identifier, attempt: u32, error: &SourceError) {
        tracing::warn!(%identifier, attempt, %error, "Fetch attempt failed");
    }

    fn resolved(&self, identifier: &Identifier, url: &str) {
        tracing::info!(%identifier, url, "Found potential source");
    }
}
