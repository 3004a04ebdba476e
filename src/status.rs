use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// How recent a last-activity stamp must be for a member to count as online.
pub const ONLINE_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OnlineStatus {
    Online,
    Offline,
}

/// `true` iff `last_activity` is known and less than 30 minutes before `now`.
pub fn is_online(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_activity {
        Some(at) => now.signed_duration_since(at) < Duration::minutes(ONLINE_WINDOW_MINUTES),
        None => false,
    }
}

pub fn online_status(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> OnlineStatus {
    if is_online(last_activity, now) {
        OnlineStatus::Online
    } else {
        OnlineStatus::Offline
    }
}
