//! Collaborator boundary traits.
//!
//! The subscription service only ever talks to the outside world through
//! these two traits, which keeps the core testable with in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::EventInfo;

/// Resolves an event id to its metadata via the competition directory.
///
/// Contract: exactly one attempt per invocation with a bounded timeout.
/// Implementations classify failures as `LookupNotFound` (permanent) or
/// `LookupTransient` (network/timeout/upstream error); retry policy, if
/// any, belongs to the caller.
#[async_trait]
pub trait EventDirectory: Send + Sync {
    async fn fetch(&self, event_id: &str) -> Result<EventInfo>;
}

/// Delivers messages to one user or to a fixed channel.
///
/// Both operations are fire-and-forget from the caller's perspective:
/// failures are logged and never retried, and a failed broadcast must not
/// prevent the caller from committing its state transition.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Best-effort direct message to a single user.
    async fn send_direct(&self, user_id: u64, text: &str) -> Result<()>;

    /// Best-effort broadcast to a channel, optionally with rich content
    /// (a Discord embed object).
    async fn send_broadcast(
        &self,
        channel_id: u64,
        text: &str,
        embed: Option<serde_json::Value>,
    ) -> Result<()>;
}
