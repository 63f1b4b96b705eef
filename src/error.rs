use thiserror::Error;

/// Errors returned synchronously by the [`Scheduler`](crate::scheduler::Scheduler)
/// lifecycle and submission methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("scheduler was never started")]
    NotStarted,

    #[error("scheduler stopped")]
    Stopped,

    #[error("queue full: {capacity} tasks waiting")]
    QueueFull { capacity: usize },

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(String),
}

/// Why a task body did not complete successfully.
///
/// Delivered to the [`FailureHandler`](crate::failure::FailureHandler) and to
/// the task's [`TaskHandle`](crate::task::TaskHandle), never through `submit`.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    /// The runner went away before reporting an outcome.
    #[error("task abandoned")]
    Abandoned,
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}
