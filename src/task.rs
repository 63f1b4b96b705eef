//! A Task is the unit of work the scheduler holds and runs.

use std::{
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    channel::oneshot,
    future::BoxFuture,
    FutureExt,
};

use crate::error::TaskError;

/// Execution priority. Higher values are served first.
pub type Priority = usize;

/// Submission sequence number, unique within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

pub(crate) enum Body {
    Call(Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>),
    Future(BoxFuture<'static, ()>),
}

impl Body {
    pub fn infallible<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::Call(Box::new(move || -> anyhow::Result<()> {
            f();
            Ok(())
        }))
    }

    pub fn fallible<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::Call(Box::new(f))
    }

    pub fn future<F>(f: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::Future(f.boxed())
    }

    /// Run the body to completion on the calling thread. Panics are caught.
    pub fn execute(self) -> Result<(), TaskError> {
        let result = panic::catch_unwind(AssertUnwindSafe(move || match self {
            Body::Call(f) => f(),
            Body::Future(fut) => {
                futures::executor::block_on(fut);
                Ok(())
            }
        }));

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskError::Failed(err)),
            Err(payload) => Err(TaskError::from_panic(payload)),
        }
    }
}

pub(crate) struct Task {
    id: TaskId,
    priority: Priority,
    /// Slot in the priority store; only meaningful while enqueued.
    pub(crate) heap_index: usize,
    body: Body,
    reply: oneshot::Sender<Result<(), TaskError>>,
}

impl Task {
    pub fn new(id: TaskId, priority: Priority, body: Body) -> (Self, TaskHandle) {
        let (reply, rx) = oneshot::channel();
        let task = Self {
            id,
            priority,
            heap_index: 0,
            body,
            reply,
        };
        let handle = TaskHandle { id, priority, rx };
        (task, handle)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Store ordering: higher priority first, then earlier submission.
    pub fn outranks(&self, other: &Task) -> bool {
        self.priority > other.priority || (self.priority == other.priority && self.id < other.id)
    }

    pub fn into_parts(self) -> (Body, oneshot::Sender<Result<(), TaskError>>) {
        (self.body, self.reply)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("heap_index", &self.heap_index)
            .finish_non_exhaustive()
    }
}

/// Completion handle returned by `submit`.
///
/// Resolves once the task body has returned. Dropping the handle does not
/// affect the task.
#[derive(Debug)]
#[must_use = "dropping a TaskHandle discards the task outcome"]
pub struct TaskHandle {
    id: TaskId,
    priority: Priority,
    rx: oneshot::Receiver<Result<(), TaskError>>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Block the current thread until the task has run.
    pub fn join(self) -> Result<(), TaskError> {
        futures::executor::block_on(self)
    }
}

impl Future for TaskHandle {
    type Output = Result<(), TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(TaskError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
