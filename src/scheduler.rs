use std::{
    future::Future,
    io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::{Builder, Config},
    error::SchedulerError,
    outstanding::Outstanding,
    runner,
    state::State,
    store::PriorityStore,
    task::{Body, Priority, Task, TaskHandle, TaskId},
};

/// Point-in-time counters for a [`Scheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    /// Bodies that returned, successfully or not.
    pub completed: u64,
    pub failed: u64,
    /// Times a dispatcher woke from an idle wait, for any reason.
    pub idle_wakeups: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub idle_wakeups: AtomicU64,
}

struct Inner {
    store: PriorityStore,
    state: State,
    next_id: u64,
}

/// State shared between the scheduler handle, its dispatcher and runners.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
    pub(crate) outstanding: Outstanding,
    pub(crate) counters: Counters,
    pub(crate) config: Config,
    /// Priorities in the order the dispatcher handed tasks to runners.
    #[cfg(test)]
    pub(crate) dispatch_log: Mutex<Vec<Priority>>,
}

impl Shared {
    /// Pop the next task, waiting while the queue is empty. Returns `None`
    /// once stopping and the queue has drained.
    pub(crate) fn next_task(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.store.pop() {
                return Some(task);
            }
            if inner.state.is_closed() {
                return None;
            }
            let timed_out = self
                .wake
                .wait_for(&mut inner, self.config.idle_wait)
                .timed_out();
            self.counters.idle_wakeups.fetch_add(1, Ordering::Relaxed);
            trace!(timed_out, "dispatcher woke");
        }
    }

    /// Close the scheduler and drop whatever is still queued. Handles of
    /// dropped tasks resolve to [`TaskError::Abandoned`].
    ///
    /// [`TaskError::Abandoned`]: crate::error::TaskError::Abandoned
    fn abandon_queued(&self) -> usize {
        let dropped: Vec<Task> = {
            let mut inner = self.inner.lock();
            inner.state = State::Stopping;
            std::iter::from_fn(|| inner.store.pop()).collect()
        };
        self.wake.notify_all();

        let count = dropped.len();
        for task in dropped {
            drop(task);
            self.outstanding.done();
        }
        count
    }
}

/// A priority task scheduler.
///
/// Tasks are held in a max-heap and dispatched highest priority first, FIFO
/// among equal priorities. By default every dispatched task gets its own
/// thread; [`Builder::workers`] bounds that to a fixed pool.
///
/// No backpressure is applied unless [`Builder::queue_capacity`] is set: the
/// queue grows without limit under sustained overload. A body that never
/// returns makes [`Scheduler::stop`] block forever, and calling `stop` from
/// inside a task body deadlocks.
pub struct Scheduler {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if matches!(self.state(), State::Running | State::Stopping) {
            debug!("scheduler dropped while running, stopping");
            let _ = self.stop();
        }
    }
}

impl Scheduler {
    /// An idle scheduler with default settings. Call [`start`](Self::start)
    /// to begin dispatching.
    pub fn new() -> Self {
        Builder::new().build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn with_config(config: Config) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                store: PriorityStore::new(),
                state: State::Idle,
                next_id: 0,
            }),
            wake: Condvar::new(),
            outstanding: Outstanding::new(),
            counters: Counters::default(),
            config,
            #[cfg(test)]
            dispatch_log: Mutex::default(),
        });

        Self {
            shared,
            threads: Mutex::default(),
        }
    }

    /// Begin dispatching. Tasks submitted earlier become eligible at once.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut threads = self.threads.lock();
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                State::Idle => inner.state = State::Running,
                State::Running => return Err(SchedulerError::AlreadyStarted),
                State::Stopping | State::Stopped => return Err(SchedulerError::Stopped),
            }
        }

        match self.spawn_threads(&mut threads) {
            Ok(()) => {
                info!(
                    workers = ?self.shared.config.workers,
                    queued = self.queued(),
                    "scheduler started"
                );
                Ok(())
            }
            Err(err) => {
                // Threads that did spawn stay in `threads`; they exit once the
                // queue is empty and `stop` or drop joins them.
                let abandoned = self.shared.abandon_queued();
                error!(%err, abandoned, "failed to spawn scheduler threads");
                Err(SchedulerError::Spawn(err.to_string()))
            }
        }
    }

    fn spawn_threads(&self, threads: &mut Vec<JoinHandle<()>>) -> io::Result<()> {
        match self.shared.config.workers {
            None => threads.push(runner::spawn_dispatcher(Arc::clone(&self.shared))?),
            Some(n) => {
                for i in 0..n {
                    threads.push(runner::spawn_worker(Arc::clone(&self.shared), i)?);
                }
            }
        }
        Ok(())
    }

    /// Queue an infallible closure.
    pub fn submit<F>(&self, priority: Priority, f: F) -> Result<TaskHandle, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(priority, Body::infallible(f))
    }

    /// Queue a closure whose error is reported to the failure handler.
    pub fn submit_fallible<F>(&self, priority: Priority, f: F) -> Result<TaskHandle, SchedulerError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.enqueue(priority, Body::fallible(f))
    }

    /// Queue a future. It is driven to completion on its runner thread.
    pub fn submit_future<F>(&self, priority: Priority, f: F) -> Result<TaskHandle, SchedulerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.enqueue(priority, Body::future(f))
    }

    fn enqueue(&self, priority: Priority, body: Body) -> Result<TaskHandle, SchedulerError> {
        let handle = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_closed() {
                warn!(priority, "submit after stop rejected");
                return Err(SchedulerError::Stopped);
            }
            if let Some(capacity) = self.shared.config.queue_capacity {
                if inner.store.len() >= capacity {
                    warn!(priority, capacity, "queue full, submit rejected");
                    return Err(SchedulerError::QueueFull { capacity });
                }
            }

            let id = TaskId(inner.next_id);
            inner.next_id += 1;
            let (task, handle) = Task::new(id, priority, body);
            self.shared.outstanding.add();
            inner.store.push(task);
            handle
        };

        self.shared.wake.notify_one();
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(task = %handle.id(), priority, "task submitted");
        Ok(handle)
    }

    /// Refuse new work, let queued and running tasks finish, then return.
    ///
    /// Blocks until every accepted task has run; a body that never returns
    /// blocks this forever. On a scheduler that was never started this fails
    /// fast with [`SchedulerError::NotStarted`] and leaves queued tasks (and
    /// [`outstanding`](Self::outstanding)) untouched, since nothing would run
    /// them; call [`start`](Self::start) first.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let mut threads = self.threads.lock();
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                State::Running => inner.state = State::Stopping,
                // Another `stop` holds `threads` for its whole run, so seeing
                // `Stopping` here means `start` failed part way.
                State::Stopping => {}
                State::Idle => return Err(SchedulerError::NotStarted),
                State::Stopped => return Err(SchedulerError::Stopped),
            }
        }
        self.shared.wake.notify_all();
        info!(
            outstanding = self.outstanding(),
            queued = self.queued(),
            "scheduler stopping"
        );

        self.shared.outstanding.wait();
        for handle in threads.drain(..) {
            if handle.join().is_err() {
                error!("scheduler thread panicked");
            }
        }

        self.shared.inner.lock().state = State::Stopped;
        info!(stats = ?self.stats(), "scheduler stopped");
        Ok(())
    }

    /// Tasks submitted whose bodies have not finished.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.get()
    }

    /// Tasks waiting in the queue, not yet dispatched.
    pub fn queued(&self) -> usize {
        self.shared.inner.lock().store.len()
    }

    pub fn state(&self) -> State {
        self.shared.inner.lock().state
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.shared.counters;
        SchedulerStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            idle_wakeups: c.idle_wakeups.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc::channel, thread, time::Duration};

    use super::*;
    use crate::error::TaskError;

    #[test]
    fn spawn() {
        let shared = Arc::new(Mutex::new(vec![]));
        let scheduler = Scheduler::builder().workers(2).build();
        scheduler.start().unwrap();
        let num_tasks = 10;
        let num_pushes = 10;

        for i in 0..num_tasks {
            let shared = Arc::clone(&shared);
            let _ = scheduler.submit(i, move || {
                for _ in 0..num_pushes {
                    let mut data = shared.lock();
                    data.push(());
                }
            });
        }

        scheduler.stop().unwrap();
        assert_eq!(shared.lock().len(), num_tasks * num_pushes);
    }

    #[test]
    fn dispatcher_pops_in_priority_order() {
        let (tx, rx) = channel();
        let scheduler = Scheduler::new();
        let mut handles = vec![];
        for priority in [1, 5, 3] {
            let tx = tx.clone();
            handles.push(scheduler.submit(priority, move || tx.send(priority).unwrap()).unwrap());
        }

        scheduler.start().unwrap();
        scheduler.stop().unwrap();

        assert_eq!(*scheduler.shared.dispatch_log.lock(), vec![5, 3, 1]);
        let mut ran: Vec<Priority> = rx.try_iter().collect();
        ran.sort();
        assert_eq!(ran, vec![1, 3, 5]);
        handles.into_iter().for_each(|h| h.join().unwrap());
    }

    #[test]
    fn stop_before_start_leaves_queue_alone() {
        let scheduler = Scheduler::new();
        let handle = scheduler.submit(1, || {}).unwrap();

        assert_eq!(scheduler.stop(), Err(SchedulerError::NotStarted));
        assert_eq!(scheduler.state(), State::Idle);
        assert_eq!(scheduler.outstanding(), 1);
        assert_eq!(scheduler.queued(), 1);

        scheduler.start().unwrap();
        scheduler.stop().unwrap();
        assert_eq!(scheduler.outstanding(), 0);
        assert!(handle.join().is_ok());
    }

    #[test]
    fn failed_start_keeps_spawned_workers_joinable() {
        let config = Config {
            workers: Some(3),
            fail_worker_spawn: Some(2),
            ..Config::default()
        };
        let scheduler = Scheduler::with_config(config);
        let handles: Vec<_> = (0..4)
            .map(|i| scheduler.submit(i, || thread::sleep(Duration::from_millis(5))).unwrap())
            .collect();

        assert!(matches!(scheduler.start(), Err(SchedulerError::Spawn(_))));
        assert_eq!(scheduler.state(), State::Stopping);
        assert_eq!(scheduler.threads.lock().len(), 2);
        assert!(matches!(scheduler.submit(1, || {}), Err(SchedulerError::Stopped)));

        scheduler.stop().unwrap();
        assert_eq!(scheduler.state(), State::Stopped);
        assert!(scheduler.threads.lock().is_empty());
        assert_eq!(scheduler.outstanding(), 0);
        assert_eq!(scheduler.queued(), 0);
        for handle in handles {
            assert!(matches!(handle.join(), Ok(()) | Err(TaskError::Abandoned)));
        }
        assert_eq!(scheduler.stop(), Err(SchedulerError::Stopped));
    }

    #[test]
    fn lifecycle_misuse() {
        let scheduler = Scheduler::new();
        assert_eq!(scheduler.state(), State::Idle);
        assert_eq!(scheduler.stop(), Err(SchedulerError::NotStarted));

        scheduler.start().unwrap();
        assert_eq!(scheduler.start(), Err(SchedulerError::AlreadyStarted));

        scheduler.stop().unwrap();
        assert_eq!(scheduler.state(), State::Stopped);
        assert_eq!(scheduler.stop(), Err(SchedulerError::Stopped));
        assert_eq!(scheduler.start(), Err(SchedulerError::Stopped));
        assert!(matches!(
            scheduler.submit(1, || {}),
            Err(SchedulerError::Stopped)
        ));
    }

    #[test]
    fn queue_capacity_rejects() {
        let scheduler = Scheduler::builder().queue_capacity(2).build();
        let _a = scheduler.submit(1, || {}).unwrap();
        let _b = scheduler.submit(1, || {}).unwrap();
        assert!(matches!(
            scheduler.submit(1, || {}),
            Err(SchedulerError::QueueFull { capacity: 2 })
        ));
        assert_eq!(scheduler.queued(), 2);
        assert_eq!(scheduler.outstanding(), 2);

        scheduler.start().unwrap();
        scheduler.stop().unwrap();
        assert_eq!(scheduler.stats().completed, 2);
    }

    #[test]
    fn submit_before_start_waits() {
        let (tx, rx) = channel();
        let scheduler = Scheduler::new();
        let _h = scheduler.submit(3, move || tx.send(()).unwrap()).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(scheduler.queued(), 1);

        scheduler.start().unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        scheduler.stop().unwrap();
    }

    #[test]
    fn drop_stops_running_scheduler() {
        let counter = Arc::new(AtomicU64::new(0));
        {
            let scheduler = Scheduler::new();
            scheduler.start().unwrap();
            for _ in 0..5 {
                let counter = Arc::clone(&counter);
                let _ = scheduler.submit(0, move || {
                    thread::sleep(Duration::from_millis(5));
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
