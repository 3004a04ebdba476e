use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Payload tracked on the presence channel while a member is visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceAnnouncement {
    pub user_id: UserId,
    pub online_at: DateTime<Utc>,
}

impl PresenceAnnouncement {
    pub fn new(user_id: UserId, online_at: DateTime<Utc>) -> Self {
        Self { user_id, online_at }
    }
}
