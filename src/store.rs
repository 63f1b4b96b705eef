//! Binary max-heap holding tasks that have not been dispatched yet.
//!
//! The store does no locking of its own; the scheduler serializes access.
//! Ordering is by priority, highest first, with earlier submissions winning
//! ties so that equal-priority work runs in FIFO order.

use crate::task::Task;

#[derive(Debug, Default)]
pub(crate) struct PriorityStore {
    heap: Vec<Task>,
}

impl PriorityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn push(&mut self, mut task: Task) {
        let index = self.heap.len();
        task.heap_index = index;
        self.heap.push(task);
        self.sift_up(index);
    }

    /// Remove the highest-ranked task, or `None` when empty.
    pub fn pop(&mut self) -> Option<Task> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let task = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        task
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.heap[index].outranks(&self.heap[parent]) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut best = left;
            if right < len && self.heap[right].outranks(&self.heap[left]) {
                best = right;
            }
            if !self.heap[best].outranks(&self.heap[index]) {
                break;
            }
            self.swap(index, best);
            index = best;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.heap[a].heap_index = a;
        self.heap[b].heap_index = b;
    }
}
