use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RecorderStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl RecorderStatus {
    /// Holding the microphone.
    pub fn is_active(self) -> bool {
        matches!(self, RecorderStatus::Recording | RecorderStatus::Paused)
    }
}

/// `m:ss`, e.g. `0:07` or `12:03`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
