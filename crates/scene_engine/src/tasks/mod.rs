//! Worker pool and task queues used by the frame pipeline

pub mod pool;
pub mod queue;

pub use pool::{TaskHandle, WorkerPool};
pub use queue::TaskQueue;
