//! Presence: announcing "this member is online" on a shared channel.

mod hub;
mod publisher;

pub use hub::{LocalPresenceHub, PresenceState};
pub use publisher::PresencePublisher;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::PresenceAnnouncement;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("unknown presence subscription {0}")]
    UnknownSubscription(SubscriptionId),

    #[error("presence channel unavailable: {0}")]
    Unavailable(String),
}

pub type PresenceResult<T> = Result<T, PresenceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Realtime presence service. One subscription per member per channel.
#[async_trait]
pub trait PresenceTransport: Send + Sync {
    /// Join `channel` as `member_key`. Returns once the subscription is
    /// confirmed.
    async fn subscribe(&self, channel: &str, member_key: &str) -> PresenceResult<SubscriptionId>;

    /// Publish (or replace) this subscription's announcement.
    async fn track(
        &self,
        subscription: SubscriptionId,
        announcement: PresenceAnnouncement,
    ) -> PresenceResult<()>;

    /// Withdraw the announcement but stay subscribed.
    async fn untrack(&self, subscription: SubscriptionId) -> PresenceResult<()>;

    /// Leave the channel; any announcement goes with it.
    async fn unsubscribe(&self, subscription: SubscriptionId) -> PresenceResult<()>;
}
