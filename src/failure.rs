//! Where failed task bodies get reported.
//!
//! `submit` has already returned by the time a body runs, so failures travel
//! through an injected [`FailureHandler`] (and the task's own handle) instead
//! of the scheduler's return values.

use tracing::error;

use crate::{
    error::TaskError,
    task::{Priority, TaskId},
};

pub trait FailureHandler: Send + Sync {
    /// Called on the runner thread after a body errors or panics.
    fn on_failure(&self, id: TaskId, priority: Priority, error: &TaskError);
}

impl<F> FailureHandler for F
where
    F: Fn(TaskId, Priority, &TaskError) + Send + Sync,
{
    fn on_failure(&self, id: TaskId, priority: Priority, error: &TaskError) {
        self(id, priority, error)
    }
}

/// Default handler: logs each failure at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailures;

impl FailureHandler for LogFailures {
    fn on_failure(&self, id: TaskId, priority: Priority, error: &TaskError) {
        error!(task = %id, priority, %error, "task failed");
    }
}
