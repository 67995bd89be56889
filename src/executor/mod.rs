//! Test execution engine
//!
//! Provides the executor seam, the worker pool and job queues.

mod cancel;
mod pool;
mod process;

pub use cancel::CancelToken;
pub use pool::{
    default_worker_count, JobQueue, QueueError, ResultStream, RunError, RunOutcome, WorkerPool,
};
pub use process::{Execution, Executor, ExecutorError, ProcessExecutor};
