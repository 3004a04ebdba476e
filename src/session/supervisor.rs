use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{ActivityCoordinator, ActivityDeps, LifecycleEvent, Visibility};
use crate::{identity::AuthContext, models::AuthUser};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// How long shutdown waits for in-flight remote calls before abandoning them.
pub const REMOTE_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Run activity tracking for whoever is signed in.
///
/// A coordinator is started when a member signs in, receives the host's
/// lifecycle events, and is torn down on sign-out, on `Teardown`, when the
/// event channel closes, or when `shutdown` fires. Page visibility is
/// tracked here, so a member who signs in while the page is hidden starts
/// hidden.
pub fn spawn_activity_supervisor(
    deps: ActivityDeps,
    auth: AuthContext,
    events: mpsc::Receiver<LifecycleEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(supervise(deps, auth, events, shutdown))
}

async fn supervise(
    deps: ActivityDeps,
    mut auth: AuthContext,
    mut events: mpsc::Receiver<LifecycleEvent>,
    shutdown: CancellationToken,
) {
    let tasks = TaskTracker::new();
    let mut visibility = Visibility::Visible;
    let mut coordinator =
        switch_user(&deps, &tasks, visibility, None, auth.current_and_mark_seen()).await;
    let mut auth_open = true;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log_debug!("[activity] supervisor shutting down");
                break;
            }
            changed = auth.changed(), if auth_open => {
                if changed.is_err() {
                    // Auth layer is gone; keep the last identity until teardown.
                    auth_open = false;
                    continue;
                }
                let next = auth.current_and_mark_seen();
                coordinator = switch_user(&deps, &tasks, visibility, coordinator, next).await;
            }
            event = events.recv() => match event {
                Some(LifecycleEvent::Teardown) | None => break,
                Some(event) => {
                    visibility = visibility.after(event);
                    if let Some(active) = coordinator.as_mut() {
                        active.handle(event).await;
                    }
                }
            },
        }
    }

    if let Some(active) = coordinator.take() {
        active.on_teardown().await;
    }

    tasks.close();
    if tokio::time::timeout(REMOTE_DRAIN_GRACE, tasks.wait())
        .await
        .is_err()
    {
        log_warn!(
            "[activity] abandoning {} remote call(s) still in flight",
            tasks.len()
        );
    }
    log_info!("[activity] supervisor stopped");
}

async fn switch_user(
    deps: &ActivityDeps,
    tasks: &TaskTracker,
    visibility: Visibility,
    current: Option<ActivityCoordinator>,
    next: Option<AuthUser>,
) -> Option<ActivityCoordinator> {
    match (current, next) {
        (Some(active), Some(user)) if active.user_id() == &user.id => Some(active),
        (current, next) => {
            if let Some(active) = current {
                active.on_teardown().await;
            }
            match next {
                Some(user) => {
                    Some(ActivityCoordinator::start(deps, user, visibility, tasks.clone()).await)
                }
                None => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{ActivityBackend, BackendResult, MemoryBackend},
        clock::ManualClock,
        identity::AuthState,
        models::UserId,
        presence::LocalPresenceHub,
        settings::ClientSettings,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::sync::Arc;

    struct Harness {
        backend: MemoryBackend,
        hub: LocalPresenceHub,
        clock: ManualClock,
        auth: AuthState,
        events: mpsc::Sender<LifecycleEvent>,
        shutdown: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn harness(initial: Option<AuthUser>) -> Harness {
        let backend = MemoryBackend::new();
        harness_with(initial, Arc::new(backend.clone()), backend)
    }

    fn harness_with(
        initial: Option<AuthUser>,
        remote: Arc<dyn ActivityBackend>,
        backend: MemoryBackend,
    ) -> Harness {
        let hub = LocalPresenceHub::new();
        let clock = ManualClock::default();
        let deps = ActivityDeps {
            backend: remote,
            presence: Arc::new(hub.clone()),
            clock: Arc::new(clock.clone()),
            settings: ClientSettings::default(),
        };
        let auth = AuthState::new(initial);
        let (events, events_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle = spawn_activity_supervisor(deps, auth.context(), events_rx, shutdown.clone());
        Harness {
            backend,
            hub,
            clock,
            auth,
            events,
            shutdown,
            handle,
        }
    }

    /// A backend whose calls never complete.
    struct StalledBackend;

    #[async_trait]
    impl ActivityBackend for StalledBackend {
        async fn upsert_activity(&self, _: &UserId, _: DateTime<Utc>) -> BackendResult<()> {
            std::future::pending().await
        }

        async fn log_online_hours(&self, _: &UserId, _: f64) -> BackendResult<()> {
            std::future::pending().await
        }

        async fn trigger_daily_login(&self, _: &UserId) -> BackendResult<()> {
            std::future::pending().await
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn is_online(hub: &LocalPresenceHub, user: &str) -> bool {
        hub.state("online-users").is_present(&UserId::new(user))
    }

    #[tokio::test]
    async fn sign_in_starts_and_teardown_flushes() {
        let h = harness(None);
        settle().await;
        assert_eq!(h.backend.daily_login_count(), 0);

        h.auth.sign_in(AuthUser::new("alice"));
        settle().await;
        assert!(is_online(&h.hub, "alice"));
        assert_eq!(h.backend.daily_login_count(), 1);

        h.clock.advance(ChronoDuration::minutes(15));
        h.events.send(LifecycleEvent::Teardown).await.unwrap();
        h.handle.await.unwrap();

        assert_eq!(h.backend.logged_hours().len(), 1);
        assert!(!is_online(&h.hub, "alice"));
    }

    #[tokio::test]
    async fn lifecycle_events_reach_the_coordinator() {
        let h = harness(Some(AuthUser::new("alice")));
        settle().await;
        assert!(is_online(&h.hub, "alice"));

        h.events.send(LifecycleEvent::Background).await.unwrap();
        settle().await;
        assert!(!is_online(&h.hub, "alice"));

        h.events.send(LifecycleEvent::Foreground).await.unwrap();
        settle().await;
        assert!(is_online(&h.hub, "alice"));

        h.shutdown.cancel();
        h.handle.await.unwrap();
        assert!(!is_online(&h.hub, "alice"));
    }

    #[tokio::test]
    async fn switching_users_tears_down_the_previous_session() {
        let h = harness(Some(AuthUser::new("alice")));
        settle().await;

        h.auth.sign_in(AuthUser::new("bob"));
        settle().await;
        assert!(!is_online(&h.hub, "alice"));
        assert!(is_online(&h.hub, "bob"));
        assert_eq!(h.backend.daily_login_count(), 2);

        // Re-announcing the same member does not restart the session.
        h.auth.sign_in(AuthUser::new("bob"));
        settle().await;
        assert_eq!(h.backend.daily_login_count(), 2);

        h.auth.sign_out();
        settle().await;
        assert!(!is_online(&h.hub, "bob"));

        drop(h.events);
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn sign_in_while_hidden_stays_offline_and_counts_nothing() {
        let h = harness(Some(AuthUser::new("alice")));
        settle().await;

        h.events.send(LifecycleEvent::Background).await.unwrap();
        settle().await;
        h.auth.sign_in(AuthUser::new("bob"));
        settle().await;
        assert!(!is_online(&h.hub, "bob"));

        h.clock.advance(ChronoDuration::hours(2));
        h.events.send(LifecycleEvent::Teardown).await.unwrap();
        h.handle.await.unwrap();

        assert!(h.backend.logged_hours().is_empty());
        assert!(h.hub.subscriber_keys("online-users").is_empty());
    }

    #[tokio::test]
    async fn hiding_while_signed_out_carries_into_the_next_sign_in() {
        let h = harness(None);
        h.events.send(LifecycleEvent::Background).await.unwrap();
        settle().await;

        h.auth.sign_in(AuthUser::new("alice"));
        settle().await;
        assert!(!is_online(&h.hub, "alice"));
        assert_eq!(h.backend.daily_login_count(), 1);

        h.events.send(LifecycleEvent::Foreground).await.unwrap();
        settle().await;
        assert!(is_online(&h.hub, "alice"));

        h.shutdown.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_blocks_neither_presence_nor_shutdown() {
        let h = harness_with(
            Some(AuthUser::new("alice")),
            Arc::new(StalledBackend),
            MemoryBackend::new(),
        );
        settle().await;
        assert!(is_online(&h.hub, "alice"));

        h.clock.advance(ChronoDuration::minutes(30));
        h.events.send(LifecycleEvent::Background).await.unwrap();
        settle().await;
        assert!(!is_online(&h.hub, "alice"));

        h.events.send(LifecycleEvent::Foreground).await.unwrap();
        settle().await;
        assert!(is_online(&h.hub, "alice"));

        h.events.send(LifecycleEvent::Teardown).await.unwrap();
        h.shutdown.cancel();
        let joined = tokio::time::timeout(REMOTE_DRAIN_GRACE * 2, h.handle).await;
        assert!(joined.is_ok());
        assert!(!is_online(&h.hub, "alice"));
    }
}
