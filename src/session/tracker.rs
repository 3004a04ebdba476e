use std::{sync::Arc, time::Duration};

use chrono::Duration as ChronoDuration;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

use super::state::{duration_hours, SessionState};
use crate::{
    backend::ActivityBackend,
    clock::Clock,
    models::{FlushOutcome, UserId},
    settings::SessionSettings,
    timer::RepeatingTask,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Foreground-time accounting for one signed-in member.
///
/// Elapsed time is reported through `log_online_hours` on flush, a
/// heartbeat keeps the member's last-activity stamp fresh. Remote failures
/// never stop tracking.
#[derive(Clone)]
pub struct SessionTracker {
    user_id: UserId,
    backend: Arc<dyn ActivityBackend>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<SessionState>>,
    heartbeat: Arc<Mutex<Option<RepeatingTask>>>,
    heartbeat_interval: Duration,
    min_flush: ChronoDuration,
}

impl SessionTracker {
    pub fn new(
        user_id: UserId,
        backend: Arc<dyn ActivityBackend>,
        clock: Arc<dyn Clock>,
        settings: &SessionSettings,
    ) -> Self {
        let now = clock.now();
        Self {
            user_id,
            backend,
            clock,
            state: Arc::new(Mutex::new(SessionState::new(now))),
            heartbeat: Arc::new(Mutex::new(None)),
            heartbeat_interval: settings.heartbeat_interval(),
            min_flush: settings.min_flush(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Begin counting foreground time from now.
    pub async fn start(&self) {
        let now = self.clock.now();
        self.state.lock().await.restart(now);
        log_debug!("[session] {} started at {}", self.user_id, now);
    }

    /// Report the time since `start` (or the last flush) if it clears the
    /// floor, then restart the clock. Time below the floor is dropped.
    pub async fn flush(&self) -> FlushOutcome {
        let outcome = self.take_outcome().await;
        if let FlushOutcome::Reported { hours } = outcome {
            self.report(hours).await;
        }
        outcome
    }

    /// Same accounting as [`SessionTracker::flush`], but the remote report
    /// runs on `tasks` so the caller never waits on the network.
    pub async fn flush_detached(&self, tasks: &TaskTracker) -> FlushOutcome {
        let outcome = self.take_outcome().await;
        if let FlushOutcome::Reported { hours } = outcome {
            let tracker = self.clone();
            tasks.spawn(async move { tracker.report(hours).await });
        }
        outcome
    }

    async fn take_outcome(&self) -> FlushOutcome {
        let elapsed = {
            let mut state = self.state.lock().await;
            state.take_elapsed(self.clock.now())
        };
        let hours = duration_hours(elapsed);

        if elapsed < self.min_flush {
            log_debug!(
                "[session] {} discarded {}s below the reporting floor",
                self.user_id,
                elapsed.num_seconds()
            );
            return FlushOutcome::Discarded { hours };
        }
        FlushOutcome::Reported { hours }
    }

    async fn report(&self, hours: f64) {
        match self.backend.log_online_hours(&self.user_id, hours).await {
            Ok(()) => log_info!("[session] {} logged {:.4}h online", self.user_id, hours),
            Err(err) => log_error!(
                "[session] failed to log {:.4}h for {}: {}",
                hours,
                self.user_id,
                err
            ),
        }
    }

    /// Start the last-activity heartbeat; the first beat is sent right away.
    /// Restarting replaces a running heartbeat.
    pub async fn start_heartbeat(&self) {
        let backend = self.backend.clone();
        let clock = self.clock.clone();
        let user_id = self.user_id.clone();

        let task = RepeatingTask::spawn_immediate("activity-heartbeat", self.heartbeat_interval, move || {
            let backend = backend.clone();
            let clock = clock.clone();
            let user_id = user_id.clone();
            async move {
                let now = clock.now();
                match backend.upsert_activity(&user_id, now).await {
                    Ok(()) => log_debug!("[session] heartbeat for {} at {}", user_id, now),
                    Err(err) => log_error!("[session] heartbeat failed for {}: {}", user_id, err),
                }
            }
        });

        let mut guard = self.heartbeat.lock().await;
        if let Some(mut previous) = guard.replace(task) {
            previous.cancel();
        }
    }

    pub async fn stop_heartbeat(&self) {
        if let Some(mut task) = self.heartbeat.lock().await.take() {
            task.cancel();
        }
    }

    pub async fn heartbeat_running(&self) -> bool {
        self.heartbeat
            .lock()
            .await
            .as_ref()
            .map(RepeatingTask::is_running)
            .unwrap_or(false)
    }
}
