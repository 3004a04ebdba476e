//! Accounting calls into the hosted backend.
//!
//! The core only ever writes through these operations; the authoritative
//! counters (online hours, login streaks, last activity) live remotely.

mod error;
mod memory;
mod rest;

pub use error::{BackendError, BackendResult};
pub use memory::{BackendCall, MemoryBackend};
pub use rest::RestBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::UserId;

#[async_trait]
pub trait ActivityBackend: Send + Sync {
    /// Record `at` as the member's last activity. Last write wins.
    async fn upsert_activity(&self, user_id: &UserId, at: DateTime<Utc>) -> BackendResult<()>;

    /// Add `hours` to the member's accumulated online time.
    async fn log_online_hours(&self, user_id: &UserId, hours: f64) -> BackendResult<()>;

    /// Ask the backend to evaluate today's login against the member's
    /// streak. Same-day repeats must not double-credit; that is enforced
    /// remotely.
    async fn trigger_daily_login(&self, user_id: &UserId) -> BackendResult<()>;
}
