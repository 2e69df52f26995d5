//! Named periodic tasks with an explicit start/cancel lifecycle.
//!
//! Each task runs its tick on a [`tokio::time::interval`] until its
//! [`CancellationToken`] fires. Cancellation also abandons a tick that
//! is still in flight, so a poll that completes after teardown never
//! gets to apply its result.
//!
//! Time comes from tokio's clock, which tests freeze and advance with
//! `#[tokio::test(start_paused = true)]`.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Reference cadence of each observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    pub health: Duration,
    pub images: Duration,
    pub queue: Duration,
    /// `None` disables the model catalog watcher.
    pub models: Option<Duration>,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(30),
            images: Duration::from_secs(5),
            queue: Duration::from_secs(10),
            models: Some(Duration::from_secs(5)),
        }
    }
}

/// Shortest period a task runs at; shorter requests are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(100);

/// A running periodic task.
pub struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period`, starting immediately.
    ///
    /// The task stops when `parent` or the task's own token is
    /// cancelled. A `period` below [`MIN_PERIOD`] is raised to it. Must
    /// be called from within a tokio runtime.
    pub fn start<F, Fut>(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = if period < MIN_PERIOD {
            tracing::warn!(
                task = name,
                requested_ms = period.as_millis() as u64,
                period_ms = MIN_PERIOD.as_millis() as u64,
                "Period too short, using minimum",
            );
            MIN_PERIOD
        } else {
            period
        };
        let cancel = parent.child_token();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                task = name,
                period_ms = period.as_millis() as u64,
                "Periodic task started",
            );

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = task_cancel.cancelled() => break,
                            _ = tick() => {}
                        }
                    }
                }
            }

            tracing::info!(task = name, "Periodic task stopped");
        });

        Self {
            name,
            cancel,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the task and wait up to `grace` for it to exit.
    pub async fn stop(self, grace: Duration) {
        self.cancel.cancel();
        if tokio::time::timeout(grace, self.handle).await.is_err() {
            tracing::warn!(task = self.name, "Periodic task did not stop in time");
        }
    }
}
