use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ActivityBackend, BackendError, BackendResult};
use crate::models::UserId;

/// One recorded call against a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    UpsertActivity { user_id: UserId, at: DateTime<Utc> },
    LogOnlineHours { user_id: UserId, hours: f64 },
    TriggerDailyLogin { user_id: UserId },
}

/// In-process backend that records every call.
///
/// Used for offline runs and tests: it can be switched into a failing mode
/// to check that callers swallow backend errors. Calls are recorded even
/// when they fail. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call return `BackendError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn logged_hours(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::LogOnlineHours { hours, .. } => Some(hours),
                _ => None,
            })
            .collect()
    }

    pub fn activity_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::UpsertActivity { .. }))
            .count()
    }

    pub fn daily_login_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::TriggerDailyLogin { .. }))
            .count()
    }

    pub fn clear(&self) {
        match self.calls.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn record(&self, call: BackendCall) -> BackendResult<()> {
        match self.calls.lock() {
            Ok(mut guard) => guard.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }

        if self.failing.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("memory backend set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ActivityBackend for MemoryBackend {
    async fn upsert_activity(&self, user_id: &UserId, at: DateTime<Utc>) -> BackendResult<()> {
        self.record(BackendCall::UpsertActivity {
            user_id: user_id.clone(),
            at,
        })
    }

    async fn log_online_hours(&self, user_id: &UserId, hours: f64) -> BackendResult<()> {
        self.record(BackendCall::LogOnlineHours {
            user_id: user_id.clone(),
            hours,
        })
    }

    async fn trigger_daily_login(&self, user_id: &UserId) -> BackendResult<()> {
        self.record(BackendCall::TriggerDailyLogin {
            user_id: user_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_even_when_failing() {
        let backend = MemoryBackend::new();
        let user = UserId::new("u1");

        backend.log_online_hours(&user, 0.5).await.unwrap();
        backend.set_failing(true);
        let result = backend.trigger_daily_login(&user).await;

        assert!(matches!(result, Err(BackendError::Unavailable(_))));
        assert_eq!(backend.logged_hours(), vec![0.5]);
        assert_eq!(backend.daily_login_count(), 1);
    }
}
