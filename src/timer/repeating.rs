use std::future::Future;

use tokio::{
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// A callback re-run on a fixed period until cancelled.
///
/// The task is owned: dropping a `RepeatingTask` cancels it, so a timer can
/// never outlive the component that started it.
pub struct RepeatingTask {
    name: &'static str,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    /// First run happens one `period` after spawning.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_at(name, Instant::now() + period, period, callback)
    }

    /// First run happens right away, then every `period`.
    pub fn spawn_immediate<F, Fut>(name: &'static str, period: Duration, callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_at(name, Instant::now(), period, callback)
    }

    fn spawn_at<F, Fut>(
        name: &'static str,
        first: Instant,
        period: Duration,
        mut callback: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        log_debug!("[timer] {} stopped", name);
                        break;
                    }
                    _ = ticker.tick() => {
                        // Cancellation wins over a tick that lands at the same instant.
                        if token.is_cancelled() {
                            break;
                        }
                        callback().await;
                    }
                }
            }
        });

        Self {
            name,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled()
            && self
                .handle
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false)
    }

    /// Stop the task. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    fn counting_task(immediate: bool) -> (RepeatingTask, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let callback = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        };
        let task = if immediate {
            RepeatingTask::spawn_immediate("test", Duration::from_secs(5), callback)
        } else {
            RepeatingTask::spawn("test", Duration::from_secs(5), callback)
        };
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_task_waits_one_period() {
        let (_task, count) = counting_task(false);

        time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_task_runs_on_spawn() {
        let (_task, count) = counting_task(true);

        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_further_runs() {
        let (mut task, count) = counting_task(true);
        time::sleep(Duration::from_millis(1)).await;
        assert!(task.is_running());

        task.cancel();
        task.cancel();
        assert!(!task.is_running());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let (task, count) = counting_task(true);
        time::sleep(Duration::from_millis(1)).await;
        drop(task);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
