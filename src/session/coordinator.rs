use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use super::{DailyLoginTrigger, SessionTracker};
use crate::{
    backend::ActivityBackend,
    clock::Clock,
    models::{AuthUser, FlushOutcome, UserId},
    presence::{PresencePublisher, PresenceTransport},
    settings::ClientSettings,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Page/window lifecycle transitions the host forwards to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleEvent {
    /// Became visible again.
    Foreground,
    /// Hidden (tab switch, minimised).
    Background,
    /// Unload or unmount.
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    /// Visibility after `event`; `Teardown` leaves it unchanged.
    pub fn after(self, event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Foreground => Visibility::Visible,
            LifecycleEvent::Background => Visibility::Hidden,
            LifecycleEvent::Teardown => self,
        }
    }
}

/// Everything a coordinator needs besides the member.
#[derive(Clone)]
pub struct ActivityDeps {
    pub backend: Arc<dyn ActivityBackend>,
    pub presence: Arc<dyn PresenceTransport>,
    pub clock: Arc<dyn Clock>,
    pub settings: ClientSettings,
}

#[derive(Debug, Clone, Copy)]
enum PresenceCommand {
    Join,
    Leave,
    Teardown,
}

/// Ties session accounting, presence and the daily-login trigger to the
/// lifecycle of one signed-in member.
///
/// Remote effects (hour reports, the daily-login RPC, presence calls) run on
/// the caller's [`TaskTracker`]; lifecycle hooks only touch local state.
pub struct ActivityCoordinator {
    user: AuthUser,
    tracker: SessionTracker,
    presence: PresencePublisher,
    presence_tx: mpsc::UnboundedSender<PresenceCommand>,
    daily_login: Arc<DailyLoginTrigger>,
    visibility: Visibility,
    tasks: TaskTracker,
}

impl ActivityCoordinator {
    /// The member just became authenticated: start the session clock and
    /// heartbeat, credit today's login, and go online unless the page is
    /// currently hidden.
    pub async fn start(
        deps: &ActivityDeps,
        user: AuthUser,
        visibility: Visibility,
        tasks: TaskTracker,
    ) -> Self {
        let tracker = SessionTracker::new(
            user.id.clone(),
            deps.backend.clone(),
            deps.clock.clone(),
            &deps.settings.session,
        );
        let presence = PresencePublisher::new(
            user.id.clone(),
            deps.settings.presence.channel.clone(),
            deps.presence.clone(),
            deps.clock.clone(),
        );
        let daily_login = Arc::new(DailyLoginTrigger::new(user.id.clone(), deps.backend.clone()));
        let presence_tx = spawn_presence_worker(presence.clone(), &tasks);

        tracker.start().await;
        tracker.start_heartbeat().await;
        daily_login.fire_detached(&tasks);
        if visibility == Visibility::Visible {
            let _ = presence_tx.send(PresenceCommand::Join);
        }

        log_info!("[activity] session started for {} ({:?})", user.id, visibility);

        Self {
            user,
            tracker,
            presence,
            presence_tx,
            daily_login,
            visibility,
            tasks,
        }
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn presence(&self) -> &PresencePublisher {
        &self.presence
    }

    pub fn daily_login_fired(&self) -> bool {
        self.daily_login.has_fired()
    }

    /// Flush the visible stretch and go invisible. Repeated hides are ignored.
    pub async fn on_background(&mut self) -> Option<FlushOutcome> {
        if self.visibility == Visibility::Hidden {
            return None;
        }
        self.visibility = Visibility::Hidden;
        let outcome = self.tracker.flush_detached(&self.tasks).await;
        self.send_presence(PresenceCommand::Leave);
        Some(outcome)
    }

    /// Restart the session clock and re-announce presence.
    pub async fn on_foreground(&mut self) {
        if self.visibility == Visibility::Visible {
            return;
        }
        self.visibility = Visibility::Visible;
        self.tracker.start().await;
        self.send_presence(PresenceCommand::Join);
    }

    /// Final flush, then release the heartbeat and the presence channel.
    /// Time spent hidden was already flushed and is not reported again.
    pub async fn on_teardown(self) -> Option<FlushOutcome> {
        let outcome = match self.visibility {
            Visibility::Visible => Some(self.tracker.flush_detached(&self.tasks).await),
            Visibility::Hidden => None,
        };
        self.tracker.stop_heartbeat().await;
        self.send_presence(PresenceCommand::Teardown);
        log_info!("[activity] session closed for {}", self.user.id);
        outcome
    }

    /// Route a non-terminal lifecycle event. `Teardown` must go through
    /// [`ActivityCoordinator::on_teardown`], which consumes the coordinator.
    pub async fn handle(&mut self, event: LifecycleEvent) -> Option<FlushOutcome> {
        match event {
            LifecycleEvent::Foreground => {
                self.on_foreground().await;
                None
            }
            LifecycleEvent::Background => self.on_background().await,
            LifecycleEvent::Teardown => None,
        }
    }

    fn send_presence(&self, command: PresenceCommand) {
        if self.presence_tx.send(command).is_err() {
            log_debug!("[activity] presence worker gone, dropped {:?}", command);
        }
    }
}

/// Presence calls run one at a time, in the order the lifecycle issued them.
/// The subscription is released once the coordinator is gone, even without
/// an explicit teardown.
fn spawn_presence_worker(
    publisher: PresencePublisher,
    tasks: &TaskTracker,
) -> mpsc::UnboundedSender<PresenceCommand> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tasks.spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                PresenceCommand::Join => publisher.join().await,
                PresenceCommand::Leave => publisher.leave().await,
                PresenceCommand::Teardown => break,
            }
        }
        publisher.teardown().await;
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::MemoryBackend, clock::ManualClock, presence::LocalPresenceHub};
    use chrono::Duration;

    struct Harness {
        backend: MemoryBackend,
        hub: LocalPresenceHub,
        clock: ManualClock,
        deps: ActivityDeps,
        tasks: TaskTracker,
    }

    fn harness() -> Harness {
        let backend = MemoryBackend::new();
        let hub = LocalPresenceHub::new();
        let clock = ManualClock::default();
        let deps = ActivityDeps {
            backend: Arc::new(backend.clone()),
            presence: Arc::new(hub.clone()),
            clock: Arc::new(clock.clone()),
            settings: ClientSettings::default(),
        };
        Harness {
            backend,
            hub,
            clock,
            deps,
            tasks: TaskTracker::new(),
        }
    }

    impl Harness {
        async fn start(&self, visibility: Visibility) -> ActivityCoordinator {
            ActivityCoordinator::start(
                &self.deps,
                AuthUser::new("alice"),
                visibility,
                self.tasks.clone(),
            )
            .await
        }

        /// Wait for every dispatched remote call; only valid after teardown.
        async fn drain(&self) {
            self.tasks.close();
            self.tasks.wait().await;
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn online(h: &Harness) -> bool {
        h.hub
            .state("online-users")
            .is_present(&UserId::new("alice"))
    }

    #[tokio::test]
    async fn start_triggers_login_and_presence() {
        let h = harness();
        let coordinator = h.start(Visibility::Visible).await;
        settle().await;

        assert!(coordinator.daily_login_fired());
        assert_eq!(h.backend.daily_login_count(), 1);
        assert!(online(&h));
        assert!(coordinator.tracker().heartbeat_running().await);

        coordinator.on_teardown().await;
        h.drain().await;
        assert!(!online(&h));
    }

    #[tokio::test]
    async fn background_flushes_and_withdraws_presence() {
        let h = harness();
        let mut coordinator = h.start(Visibility::Visible).await;
        settle().await;

        h.clock.advance(Duration::minutes(20));
        let outcome = coordinator.handle(LifecycleEvent::Background).await;
        settle().await;

        assert!(outcome.map(|o| o.is_reported()).unwrap_or(false));
        assert!(!online(&h));
        assert_eq!(coordinator.visibility(), Visibility::Hidden);

        // Hidden time is never reported, even across a second hide.
        h.clock.advance(Duration::hours(3));
        assert_eq!(coordinator.handle(LifecycleEvent::Background).await, None);

        coordinator.handle(LifecycleEvent::Foreground).await;
        settle().await;
        assert!(online(&h));
        h.clock.advance(Duration::minutes(1));
        let outcome = coordinator.on_teardown().await;
        assert_eq!(outcome.map(|o| o.is_reported()), Some(false));
        h.drain().await;

        assert_eq!(h.backend.logged_hours().len(), 1);
        assert!(!online(&h));
        assert!(h.hub.subscriber_keys("online-users").is_empty());
    }

    #[tokio::test]
    async fn teardown_while_hidden_skips_flush() {
        let h = harness();
        let mut coordinator = h.start(Visibility::Visible).await;
        coordinator.on_background().await;

        h.clock.advance(Duration::hours(1));
        let tracker = coordinator.tracker().clone();
        assert_eq!(coordinator.on_teardown().await, None);
        h.drain().await;

        assert!(h.backend.logged_hours().is_empty());
        assert!(!tracker.heartbeat_running().await);
    }

    #[tokio::test]
    async fn starting_hidden_stays_offline_until_foreground() {
        let h = harness();
        let mut coordinator = h.start(Visibility::Hidden).await;
        settle().await;

        assert!(!online(&h));
        assert_eq!(h.backend.daily_login_count(), 1);

        // Hidden time before the first foreground is not counted.
        h.clock.advance(Duration::hours(2));
        coordinator.handle(LifecycleEvent::Foreground).await;
        settle().await;
        assert!(online(&h));

        h.clock.advance(Duration::minutes(6));
        let outcome = coordinator.on_teardown().await;
        h.drain().await;

        assert!((outcome.map(|o| o.hours()).unwrap_or_default() - 0.1).abs() < 1e-9);
        assert_eq!(h.backend.logged_hours().len(), 1);
    }

    #[tokio::test]
    async fn dropping_the_coordinator_releases_presence() {
        let h = harness();
        let coordinator = h.start(Visibility::Visible).await;
        settle().await;
        assert!(online(&h));

        drop(coordinator);
        h.drain().await;

        assert!(!online(&h));
        assert!(h.hub.subscriber_keys("online-users").is_empty());
    }

    #[tokio::test]
    async fn backend_outage_does_not_block_lifecycle() {
        let h = harness();
        h.backend.set_failing(true);
        h.hub.set_available(false);

        let mut coordinator = h.start(Visibility::Visible).await;
        h.clock.advance(Duration::minutes(30));
        coordinator.on_background().await;
        coordinator.on_foreground().await;
        coordinator.on_teardown().await;
        h.drain().await;

        assert_eq!(h.backend.logged_hours().len(), 1);
    }

    #[test]
    fn visibility_follows_events() {
        let hidden = Visibility::Visible.after(LifecycleEvent::Background);
        assert_eq!(hidden, Visibility::Hidden);
        assert_eq!(hidden.after(LifecycleEvent::Teardown), Visibility::Hidden);
        assert_eq!(hidden.after(LifecycleEvent::Foreground), Visibility::Visible);
    }
}
