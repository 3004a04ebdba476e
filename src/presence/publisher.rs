use std::sync::Arc;

use tokio::sync::Mutex;

use super::{PresenceTransport, SubscriptionId};
use crate::{clock::Clock, models::PresenceAnnouncement, models::UserId};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Default)]
struct PublisherState {
    subscription: Option<SubscriptionId>,
    tracked: bool,
}

/// Makes one member visible on the presence channel.
///
/// Failures are logged and dropped; the next foreground re-announces.
#[derive(Clone)]
pub struct PresencePublisher {
    user_id: UserId,
    channel: String,
    transport: Arc<dyn PresenceTransport>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<PublisherState>>,
}

impl PresencePublisher {
    pub fn new(
        user_id: UserId,
        channel: impl Into<String>,
        transport: Arc<dyn PresenceTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_id,
            channel: channel.into(),
            transport,
            clock,
            state: Arc::new(Mutex::new(PublisherState::default())),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn is_subscribed(&self) -> bool {
        self.state.lock().await.subscription.is_some()
    }

    pub async fn is_tracked(&self) -> bool {
        self.state.lock().await.tracked
    }

    /// Subscribe (once) and announce.
    pub async fn join(&self) {
        let mut state = self.state.lock().await;
        if state.subscription.is_none() {
            match self
                .transport
                .subscribe(&self.channel, self.user_id.as_str())
                .await
            {
                Ok(subscription) => {
                    log_debug!(
                        "[presence] {} subscribed to {}",
                        self.user_id,
                        self.channel
                    );
                    state.subscription = Some(subscription);
                }
                Err(err) => {
                    log_warn!(
                        "[presence] subscribe to {} failed for {}: {}",
                        self.channel,
                        self.user_id,
                        err
                    );
                    return;
                }
            }
        }
        self.announce(&mut state).await;
    }

    /// Re-announce after returning to the foreground.
    pub async fn rejoin(&self) {
        self.join().await;
    }

    /// Withdraw the announcement but keep the subscription.
    pub async fn leave(&self) {
        let mut state = self.state.lock().await;
        let Some(subscription) = state.subscription else {
            return;
        };
        if let Err(err) = self.transport.untrack(subscription).await {
            log_warn!("[presence] untrack failed for {}: {}", self.user_id, err);
        }
        state.tracked = false;
    }

    /// Withdraw and release the subscription.
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        let Some(subscription) = state.subscription.take() else {
            return;
        };
        if state.tracked {
            if let Err(err) = self.transport.untrack(subscription).await {
                log_warn!("[presence] untrack failed for {}: {}", self.user_id, err);
            }
        }
        if let Err(err) = self.transport.unsubscribe(subscription).await {
            log_warn!(
                "[presence] unsubscribe from {} failed for {}: {}",
                self.channel,
                self.user_id,
                err
            );
        }
        state.tracked = false;
        log_debug!("[presence] {} left {}", self.user_id, self.channel);
    }

    async fn announce(&self, state: &mut PublisherState) {
        let Some(subscription) = state.subscription else {
            return;
        };
        let announcement = PresenceAnnouncement::new(self.user_id.clone(), self.clock.now());
        match self.transport.track(subscription, announcement).await {
            Ok(()) => state.tracked = true,
            Err(err) => {
                log_warn!("[presence] track failed for {}: {}", self.user_id, err);
            }
        }
    }
}
