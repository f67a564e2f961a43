//! Worker thread pool
//!
//! Jobs are fed to long-lived worker threads through a crossbeam channel.
//! Every submission returns a [`TaskHandle`] that can be waited on; a pool
//! built with zero threads runs each job inline on the submitting thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct GroupState {
    remaining: usize,
    panic: Option<String>,
}

#[derive(Default)]
struct TaskGroup {
    state: Mutex<GroupState>,
    finished: Condvar,
}

impl TaskGroup {
    fn complete(&self, panic: Option<String>) {
        let mut state = self.state.lock();
        state.remaining -= 1;
        if state.panic.is_none() {
            state.panic = panic;
        }
        if state.remaining == 0 {
            self.finished.notify_all();
        }
    }
}

/// Awaitable handle on one or more jobs submitted together
#[derive(Clone)]
pub struct TaskHandle {
    group: Arc<TaskGroup>,
}

impl TaskHandle {
    fn with_jobs(count: usize) -> Self {
        let group = TaskGroup {
            state: Mutex::new(GroupState { remaining: count, panic: None }),
            finished: Condvar::new(),
        };
        Self { group: Arc::new(group) }
    }

    /// Handle that is already complete
    pub fn finished() -> Self {
        Self::with_jobs(0)
    }

    /// Whether every job of the group has run
    pub fn is_finished(&self) -> bool {
        self.group.state.lock().remaining == 0
    }

    /// Whether a job of the group panicked and the panic was not yet raised
    pub fn has_failed(&self) -> bool {
        self.group.state.lock().panic.is_some()
    }

    /// Block until every job of the group has run
    ///
    /// # Panics
    ///
    /// Re-raises a panic from any job of the group; a failed task leaves the
    /// frame in an unknown state and is not recoverable.
    pub fn wait(&self) {
        let mut state = self.group.state.lock();
        while state.remaining > 0 {
            self.group.finished.wait(&mut state);
        }
        if let Some(message) = state.panic.take() {
            drop(state);
            panic!("worker task panicked: {message}");
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Thread pool for parallel frame work
pub struct WorkerPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads; zero runs every job inline
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();

        let workers = (0..size)
            .map(|id| Worker::new(id, receiver.clone()))
            .collect::<Vec<_>>();

        log::debug!("Worker pool started with {} threads", size);

        Self {
            workers,
            sender: Some(sender),
        }
    }

    /// Pool sized from a worker configuration
    pub fn from_config(config: &crate::core::WorkerConfig) -> Self {
        Self::new(config.threads)
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Submit one job
    pub fn spawn<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = TaskHandle::with_jobs(1);
        self.submit(&handle, Box::new(f));
        handle
    }

    /// Run `f` over every item, split into contiguous chunks of at least `min_chunk`
    ///
    /// One job is submitted per chunk and all of them share the returned
    /// handle. An empty slice yields an already finished handle.
    pub fn parallel_for<T, F>(&self, items: Arc<[T]>, min_chunk: usize, f: F) -> TaskHandle
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        if items.is_empty() {
            return TaskHandle::finished();
        }

        let workers = self.threads().max(1);
        let chunk = min_chunk.max(1).max(items.len().div_ceil(workers));
        let chunks = items.len().div_ceil(chunk);

        let handle = TaskHandle::with_jobs(chunks);
        let f = Arc::new(f);
        for index in 0..chunks {
            let items = Arc::clone(&items);
            let f = Arc::clone(&f);
            let start = index * chunk;
            let end = (start + chunk).min(items.len());
            self.submit(
                &handle,
                Box::new(move || {
                    for item in &items[start..end] {
                        f(item);
                    }
                }),
            );
        }
        handle
    }

    fn submit(&self, handle: &TaskHandle, job: Job) {
        let group = Arc::clone(&handle.group);
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job));
            group.complete(result.err().map(|payload| panic_message(payload.as_ref())));
        });

        match &self.sender {
            Some(sender) if !self.workers.is_empty() => {
                if let Err(error) = sender.send(job) {
                    // Receivers live as long as the pool, so this only happens mid-drop
                    log::error!("Worker pool closed; running task inline");
                    (error.into_inner())();
                }
            }
            _ => job(),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::from_config(&crate::core::WorkerConfig::default())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop
        self.sender.take();
        for worker in self.workers.drain(..) {
            if let Some(thread) = worker.thread {
                if thread.join().is_err() {
                    log::error!("Worker {} exited abnormally", worker.id);
                }
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Job>) -> Self {
        let thread = thread::Builder::new()
            .name(format!("scene-worker-{id}"))
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            });

        match thread {
            Ok(thread) => Self { id, thread: Some(thread) },
            Err(error) => panic!("failed to spawn worker thread {id}: {error}"),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
