//! FIFO queue of in-flight tasks

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::pool::TaskHandle;

/// Ordered set of watched tasks that can be awaited as a whole
///
/// The lock is held only to push or pop a handle, never while waiting, so a
/// render thread and the simulation thread can share one queue.
#[derive(Debug, Default)]
pub struct TaskQueue {
    name: &'static str,
    pending: Mutex<VecDeque<TaskHandle>>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Track a task
    pub fn watch(&self, handle: TaskHandle) {
        self.pending.lock().push_back(handle);
    }

    /// Block until every watched task has finished, in enqueue order
    ///
    /// Tasks watched while waiting are awaited too.
    pub fn await_all(&self) {
        let mut awaited = 0usize;
        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(handle) => {
                    handle.wait();
                    awaited += 1;
                }
                None => break,
            }
        }
        if awaited > 0 {
            log::trace!("Awaited {} tasks on the {} queue", awaited, self.name);
        }
    }

    /// Whether no watched task is still running
    ///
    /// Finished handles at the front of the queue are pruned; a failed one
    /// stays until [`await_all`](Self::await_all) raises its panic.
    pub fn is_idle(&self) -> bool {
        let mut pending = self.pending.lock();
        while pending.front().is_some_and(|handle| handle.is_finished() && !handle.has_failed()) {
            pending.pop_front();
        }
        pending.iter().all(TaskHandle::is_finished)
    }

    /// Number of watched tasks not yet pruned
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether nothing is being watched
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::WorkerPool;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_await_all_drains_queue() {
        let pool = WorkerPool::new(2);
        let queue = TaskQueue::new("processing");
        let done = Arc::new(AtomicBool::new(false));
        let d = Arc::clone(&done);
        queue.watch(pool.spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            d.store(true, Ordering::SeqCst);
        }));

        queue.await_all();
        assert!(done.load(Ordering::SeqCst));
        assert!(queue.is_empty());
        assert!(queue.is_idle());
    }

    #[test]
    fn test_idle_prunes_finished_handles() {
        let queue = TaskQueue::new("rendering");
        queue.watch(TaskHandle::finished());
        queue.watch(TaskHandle::finished());
        assert!(queue.is_idle());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    #[should_panic(expected = "worker task panicked")]
    fn test_idle_keeps_failed_handle_for_await() {
        let pool = WorkerPool::new(0);
        let queue = TaskQueue::new("processing");
        queue.watch(pool.spawn(|| panic!("lost frame")));

        assert!(queue.is_idle());
        assert_eq!(queue.len(), 1);
        queue.await_all();
    }
}
