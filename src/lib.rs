//! A priority-based task scheduler.
//!
//! Work is submitted with a priority, held in a max-heap, and dispatched
//! highest priority first (FIFO among equal priorities). Each dispatched task
//! runs on its own thread, or on a fixed worker pool when configured with
//! [`Builder::workers`]. [`Scheduler::stop`] refuses new work and returns only
//! once every submitted task has finished.
//!
//! # Examples
//! ```rust
//! use std::sync::mpsc::channel;
//! use whirlpool_sched::Scheduler;
//!
//! let scheduler = Scheduler::new();
//! let (tx, rx) = channel();
//!
//! for priority in [1, 5, 3] {
//!     let tx = tx.clone();
//!     let _ = scheduler.submit(priority, move || tx.send(priority).unwrap());
//! }
//!
//! scheduler.start().unwrap();
//! scheduler.stop().unwrap();
//!
//! let mut seen: Vec<usize> = rx.try_iter().collect();
//! seen.sort();
//! assert_eq!(seen, vec![1, 3, 5]);
//! ```
//!
//! Failed bodies never reach `submit`'s caller. They are reported to the
//! [`FailureHandler`] (logged via `tracing` by default) and to the task's
//! [`TaskHandle`]:
//! ```rust
//! use whirlpool_sched::{Scheduler, TaskError};
//!
//! let scheduler = Scheduler::new();
//! scheduler.start().unwrap();
//! let handle = scheduler
//!     .submit_fallible(1, || Err(anyhow::anyhow!("no route to host")))
//!     .unwrap();
//! assert!(matches!(handle.join(), Err(TaskError::Failed(_))));
//! scheduler.stop().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod failure;
pub(crate) mod outstanding;
pub(crate) mod runner;
pub mod scheduler;
pub mod state;
pub(crate) mod store;
pub mod task;

pub use config::Builder;
pub use error::{SchedulerError, TaskError};
pub use failure::{FailureHandler, LogFailures};
pub use scheduler::{Scheduler, SchedulerStats};
pub use state::State;
pub use task::{Priority, TaskHandle, TaskId};
