use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A chat message as loaded into a channel view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    pub body: String,
    /// `None` when the author's profile could not be joined in.
    pub author: Option<Author>,
    pub created_at: DateTime<Utc>,
    pub voice_url: Option<String>,
}

impl ChatMessage {
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().map(|author| author.display_name.as_str())
    }
}
