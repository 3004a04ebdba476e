use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{PresenceError, PresenceResult, PresenceTransport, SubscriptionId};
use crate::models::{PresenceAnnouncement, UserId};

/// Synced view of one channel: every tracked announcement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceState {
    pub announcements: Vec<PresenceAnnouncement>,
}

impl PresenceState {
    pub fn online_users(&self) -> BTreeSet<UserId> {
        self.announcements
            .iter()
            .map(|announcement| announcement.user_id.clone())
            .collect()
    }

    pub fn is_present(&self, user_id: &UserId) -> bool {
        self.announcements
            .iter()
            .any(|announcement| &announcement.user_id == user_id)
    }
}

struct Member {
    key: String,
    announcement: Option<PresenceAnnouncement>,
}

struct Channel {
    members: HashMap<SubscriptionId, Member>,
    state_tx: watch::Sender<PresenceState>,
}

impl Channel {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(PresenceState::default());
        Self {
            members: HashMap::new(),
            state_tx,
        }
    }

    fn publish(&self) {
        let mut announcements: Vec<PresenceAnnouncement> = self
            .members
            .values()
            .filter_map(|member| member.announcement.clone())
            .collect();
        announcements.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.online_at.cmp(&b.online_at))
        });
        self.state_tx.send_replace(PresenceState { announcements });
    }
}

#[derive(Default)]
struct HubInner {
    channels: HashMap<String, Channel>,
    subscriptions: HashMap<SubscriptionId, String>,
}

/// In-process presence service shared by every client in this process.
///
/// Stands in for the hosted realtime service in offline runs and tests;
/// clones share the same channels.
#[derive(Clone, Default)]
pub struct LocalPresenceHub {
    inner: Arc<Mutex<HubInner>>,
    unavailable: Arc<AtomicBool>,
}

impl LocalPresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every transport call fails until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Live view of a channel's synced state.
    pub fn watch(&self, channel: &str) -> watch::Receiver<PresenceState> {
        let mut inner = self.lock();
        inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(Channel::new)
            .state_tx
            .subscribe()
    }

    pub fn state(&self, channel: &str) -> PresenceState {
        let inner = self.lock();
        inner
            .channels
            .get(channel)
            .map(|c| c.state_tx.borrow().clone())
            .unwrap_or_default()
    }

    pub fn online_users(&self, channel: &str) -> BTreeSet<UserId> {
        self.state(channel).online_users()
    }

    /// Members subscribed to `channel`, tracked or not.
    pub fn subscriber_keys(&self, channel: &str) -> Vec<String> {
        let inner = self.lock();
        let mut keys: Vec<String> = inner
            .channels
            .get(channel)
            .map(|c| c.members.values().map(|m| m.key.clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_available(&self) -> PresenceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PresenceError::Unavailable("local hub disabled".into()))
        } else {
            Ok(())
        }
    }

    fn with_member<R>(
        &self,
        subscription: SubscriptionId,
        f: impl FnOnce(&mut Member) -> R,
    ) -> PresenceResult<R> {
        let mut inner = self.lock();
        let channel_name = inner
            .subscriptions
            .get(&subscription)
            .cloned()
            .ok_or(PresenceError::UnknownSubscription(subscription))?;
        let channel = inner
            .channels
            .get_mut(&channel_name)
            .ok_or(PresenceError::UnknownSubscription(subscription))?;
        let member = channel
            .members
            .get_mut(&subscription)
            .ok_or(PresenceError::UnknownSubscription(subscription))?;
        let result = f(member);
        channel.publish();
        Ok(result)
    }
}

#[async_trait]
impl PresenceTransport for LocalPresenceHub {
    async fn subscribe(&self, channel: &str, member_key: &str) -> PresenceResult<SubscriptionId> {
        self.ensure_available()?;
        let subscription = SubscriptionId::new();
        let mut inner = self.lock();
        inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(Channel::new)
            .members
            .insert(
                subscription,
                Member {
                    key: member_key.to_string(),
                    announcement: None,
                },
            );
        inner.subscriptions.insert(subscription, channel.to_string());
        Ok(subscription)
    }

    async fn track(
        &self,
        subscription: SubscriptionId,
        announcement: PresenceAnnouncement,
    ) -> PresenceResult<()> {
        self.ensure_available()?;
        self.with_member(subscription, |member| {
            member.announcement = Some(announcement);
        })
    }

    async fn untrack(&self, subscription: SubscriptionId) -> PresenceResult<()> {
        self.ensure_available()?;
        self.with_member(subscription, |member| {
            member.announcement = None;
        })
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> PresenceResult<()> {
        self.ensure_available()?;
        let mut inner = self.lock();
        let channel_name = inner
            .subscriptions
            .remove(&subscription)
            .ok_or(PresenceError::UnknownSubscription(subscription))?;
        if let Some(channel) = inner.channels.get_mut(&channel_name) {
            channel.members.remove(&subscription);
            channel.publish();
        }
        Ok(())
    }
}
