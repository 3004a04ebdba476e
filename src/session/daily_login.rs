use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio_util::task::TaskTracker;

use crate::{backend::ActivityBackend, models::UserId};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Asks the backend to credit today's login, at most once per session.
///
/// Streak continuity lives entirely on the backend. A failed call is not
/// retried: that day's credit is simply lost.
pub struct DailyLoginTrigger {
    user_id: UserId,
    backend: Arc<dyn ActivityBackend>,
    fired: AtomicBool,
}

impl DailyLoginTrigger {
    pub fn new(user_id: UserId, backend: Arc<dyn ActivityBackend>) -> Self {
        Self {
            user_id,
            backend,
            fired: AtomicBool::new(false),
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Returns `false` without calling the backend if this session already
    /// fired, whatever the outcome of that first call was.
    pub async fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.evaluate().await;
        true
    }

    /// Claims the session's single call now and runs it on `tasks`.
    pub fn fire_detached(self: &Arc<Self>, tasks: &TaskTracker) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        let trigger = Arc::clone(self);
        tasks.spawn(async move { trigger.evaluate().await });
        true
    }

    async fn evaluate(&self) {
        match self.backend.trigger_daily_login(&self.user_id).await {
            Ok(()) => log_info!("[daily-login] evaluated streak for {}", self.user_id),
            Err(err) => log_warn!(
                "[daily-login] streak update failed for {}: {}",
                self.user_id,
                err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn fires_exactly_once() {
        let backend = MemoryBackend::new();
        let trigger = DailyLoginTrigger::new(UserId::new("alice"), Arc::new(backend.clone()));

        assert!(trigger.fire().await);
        assert!(!trigger.fire().await);
        assert!(!trigger.fire().await);

        assert!(trigger.has_fired());
        assert_eq!(backend.daily_login_count(), 1);
    }

    #[tokio::test]
    async fn failure_is_not_retried() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);
        let trigger = DailyLoginTrigger::new(UserId::new("alice"), Arc::new(backend.clone()));

        assert!(trigger.fire().await);
        backend.set_failing(false);
        assert!(!trigger.fire().await);

        assert_eq!(backend.daily_login_count(), 1);
    }

    #[tokio::test]
    async fn detached_fire_claims_the_session_immediately() {
        let backend = MemoryBackend::new();
        let trigger = Arc::new(DailyLoginTrigger::new(
            UserId::new("alice"),
            Arc::new(backend.clone()),
        ));
        let tasks = TaskTracker::new();

        assert!(trigger.fire_detached(&tasks));
        assert!(trigger.has_fired());
        assert!(!trigger.fire_detached(&tasks));
        assert!(!trigger.fire().await);

        tasks.close();
        tasks.wait().await;
        assert_eq!(backend.daily_login_count(), 1);
    }
}
