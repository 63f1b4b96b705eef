use std::fmt;

/// Lifecycle of a [`Scheduler`](crate::scheduler::Scheduler).
///
/// `Idle -> Running -> Stopping -> Stopped`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, not started. Submissions queue up.
    Idle,
    /// Dispatching.
    Running,
    /// `stop` called; draining the queue and waiting on running tasks.
    Stopping,
    Stopped,
}

impl State {
    /// Whether new submissions are refused.
    pub fn is_closed(self) -> bool {
        matches!(self, State::Stopping | State::Stopped)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Idle => "idle",
            State::Running => "running",
            State::Stopping => "stopping",
            State::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
