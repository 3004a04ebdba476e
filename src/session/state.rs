use chrono::{DateTime, Duration, Utc};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Foreground time since the last `start` or flush. Process-local only.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub start_time: DateTime<Utc>,
}

impl SessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { start_time: now }
    }

    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.start_time = now;
    }

    /// Clamped at zero if the wall clock went backwards.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now.signed_duration_since(self.start_time);
        if elapsed < Duration::zero() {
            Duration::zero()
        } else {
            elapsed
        }
    }

    /// Elapsed time up to `now`, then restart the clock at `now`.
    pub fn take_elapsed(&mut self, now: DateTime<Utc>) -> Duration {
        let elapsed = self.elapsed(now);
        self.restart(now);
        elapsed
    }
}

pub fn duration_hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / MS_PER_HOUR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_elapsed_resets_clock() {
        let start = Utc::now();
        let mut state = SessionState::new(start);
        let later = start + Duration::minutes(12);

        assert_eq!(state.take_elapsed(later), Duration::minutes(12));
        assert_eq!(state.start_time, later);
        assert_eq!(state.take_elapsed(later), Duration::zero());
    }

    #[test]
    fn backwards_clock_counts_as_zero() {
        let start = Utc::now();
        let state = SessionState::new(start);
        assert_eq!(state.elapsed(start - Duration::seconds(5)), Duration::zero());
    }

    #[test]
    fn hours_conversion() {
        assert!((duration_hours(Duration::minutes(90)) - 1.5).abs() < 1e-12);
        assert!((duration_hours(Duration::minutes(5)) - 0.0833).abs() < 1e-4);
    }
}
