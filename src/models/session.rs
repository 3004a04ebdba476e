use serde::{Deserialize, Serialize};

/// What a session flush did with the elapsed foreground time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FlushOutcome {
    /// At or above the reporting floor; sent to `log_online_hours`.
    Reported { hours: f64 },
    /// Below the floor; dropped without a remote call.
    Discarded { hours: f64 },
}

impl FlushOutcome {
    pub fn hours(&self) -> f64 {
        match self {
            FlushOutcome::Reported { hours } | FlushOutcome::Discarded { hours } => *hours,
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, FlushOutcome::Reported { .. })
    }
}
