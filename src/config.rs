use std::{fmt, sync::Arc, time::Duration};

use crate::{
    failure::{FailureHandler, LogFailures},
    scheduler::Scheduler,
};

/// Upper bound on how long an idle dispatcher sleeps before re-checking the
/// queue when no wake signal arrives.
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(50);

pub const DEFAULT_THREAD_NAME: &str = "whirlpool";

#[derive(Clone)]
pub(crate) struct Config {
    pub idle_wait: Duration,
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub thread_name: String,
    pub failures: Arc<dyn FailureHandler>,
    /// Worker index whose spawn is refused, to exercise `start` failure.
    #[cfg(test)]
    pub fail_worker_spawn: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_wait: DEFAULT_IDLE_WAIT,
            workers: None,
            queue_capacity: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            failures: Arc::new(LogFailures),
            #[cfg(test)]
            fail_worker_spawn: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("idle_wait", &self.idle_wait)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

/// Configures and creates a [`Scheduler`].
///
/// ```
/// use std::time::Duration;
/// use whirlpool_sched::Builder;
///
/// let scheduler = Builder::new()
///     .workers(4)
///     .queue_capacity(1024)
///     .idle_wait(Duration::from_millis(20))
///     .build();
/// scheduler.start().unwrap();
/// scheduler.stop().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longest an idle dispatcher waits for a wake signal before polling the
    /// queue again. Defaults to [`DEFAULT_IDLE_WAIT`]. Zero is bumped to 1ms.
    pub fn idle_wait(mut self, idle_wait: Duration) -> Self {
        self.config.idle_wait = idle_wait.max(Duration::from_millis(1));
        self
    }

    /// Run tasks on a fixed pool of `n` worker threads instead of one thread
    /// per task. `n` is clamped to at least one.
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = Some(n.max(1));
        self
    }

    /// Reject submissions with [`SchedulerError::QueueFull`] while `capacity`
    /// tasks are waiting to be dispatched. Unbounded by default.
    ///
    /// [`SchedulerError::QueueFull`]: crate::error::SchedulerError::QueueFull
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    /// Prefix for the names of threads the scheduler spawns.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Replace the default [`LogFailures`] sink.
    pub fn failure_handler<H>(mut self, handler: H) -> Self
    where
        H: FailureHandler + 'static,
    {
        self.config.failures = Arc::new(handler);
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.idle_wait, DEFAULT_IDLE_WAIT);
        assert_eq!(config.workers, None);
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.thread_name, "whirlpool");
    }

    #[test]
    fn clamps() {
        let builder = Builder::new().workers(0).idle_wait(Duration::ZERO);
        assert_eq!(builder.config.workers, Some(1));
        assert_eq!(builder.config.idle_wait, Duration::from_millis(1));
    }
}
