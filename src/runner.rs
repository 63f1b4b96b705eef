//! Threads that take tasks off the queue and run them.

use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::{atomic::Ordering, Arc},
    thread::{self, JoinHandle},
    time::Instant,
};

use tracing::{debug, warn};

use crate::{outstanding::Completion, scheduler::Shared, task::Task};

/// Start the dispatch loop: pop tasks in priority order and give each its own
/// thread. Exits once the scheduler is stopping and the queue is empty.
pub(crate) fn spawn_dispatcher(shared: Arc<Shared>) -> io::Result<JoinHandle<()>> {
    let name = format!("{}-dispatch", shared.config.thread_name);
    thread::Builder::new().name(name).spawn(move || {
        while let Some(task) = shared.next_task() {
            #[cfg(test)]
            shared.dispatch_log.lock().push(task.priority());
            spawn_task(&shared, task);
        }
        debug!("dispatcher exiting");
    })
}

/// Start one member of a fixed pool. Workers pull from the same queue and
/// run each task inline, so at most `workers` bodies run at a time.
pub(crate) fn spawn_worker(shared: Arc<Shared>, index: usize) -> io::Result<JoinHandle<()>> {
    #[cfg(test)]
    if shared.config.fail_worker_spawn == Some(index) {
        return Err(io::Error::new(io::ErrorKind::Other, "worker spawn refused"));
    }

    let name = format!("{}-worker-{index}", shared.config.thread_name);
    thread::Builder::new().name(name).spawn(move || {
        while let Some(task) = shared.next_task() {
            run(&shared, task);
        }
        debug!(worker = index, "worker exiting");
    })
}

fn spawn_task(shared: &Arc<Shared>, task: Task) {
    // The task moves into the closure, so keep a slot to take it back if the
    // OS refuses the thread.
    let slot = Arc::new(parking_lot::Mutex::new(Some(task)));
    let name = format!("{}-task", shared.config.thread_name);
    let spawned = {
        let shared = Arc::clone(shared);
        let slot = Arc::clone(&slot);
        thread::Builder::new().name(name).spawn(move || {
            if let Some(task) = slot.lock().take() {
                run(&shared, task);
            }
        })
    };

    if let Err(err) = spawned {
        warn!(%err, "failed to spawn task thread, running on dispatcher");
        if let Some(task) = slot.lock().take() {
            run(shared, task);
        }
    }
}

/// Run one task to completion, report its outcome and settle its count.
pub(crate) fn run(shared: &Shared, task: Task) {
    let _done = Completion(&shared.outstanding);
    let (id, priority) = (task.id(), task.priority());
    let (body, reply) = task.into_parts();
    debug!(task = %id, priority, "task dispatched");

    let started = Instant::now();
    let outcome = body.execute();
    shared.counters.completed.fetch_add(1, Ordering::Relaxed);

    match &outcome {
        Ok(()) => debug!(task = %id, priority, elapsed = ?started.elapsed(), "task finished"),
        Err(err) => {
            shared.counters.failed.fetch_add(1, Ordering::Relaxed);
            let failures = &shared.config.failures;
            if panic::catch_unwind(AssertUnwindSafe(|| failures.on_failure(id, priority, err))).is_err()
            {
                warn!(task = %id, "failure handler panicked");
            }
        }
    }

    // Nobody may be listening.
    let _ = reply.send(outcome);
}
