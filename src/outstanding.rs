use parking_lot::{Condvar, Mutex};

/// Count of submitted tasks whose bodies have not finished yet.
///
/// Incremented once per accepted submission, decremented once per finished
/// body; `wait` blocks until the count drains to zero.
#[derive(Debug, Default)]
pub(crate) struct Outstanding {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Outstanding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        *self.count.lock() += 1;
    }

    pub fn done(&self) {
        let mut count = self.count.lock();
        debug_assert!(*count > 0, "outstanding count underflow");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    pub fn get(&self) -> usize {
        *self.count.lock()
    }

    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }
}

/// Calls [`Outstanding::done`] when dropped, so a body that unwinds past the
/// runner still settles its count.
pub(crate) struct Completion<'a>(pub(crate) &'a Outstanding);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}
