//! Priority task queue and worker pool for background indexing.
//!
//! One shared [`TaskQueue`] feeds a fixed-size pool of worker threads. Tasks
//! carry a priority tier and an optional tag; pending tasks can be boosted to
//! a higher tier by tag after they were enqueued, which is how interactive
//! requests jump ahead of the bulk backlog. Queue statistics are broadcast on
//! every transition so observers never slow down the workers.

mod pool;
mod queue;
mod stats;
mod task;

pub use pool::WorkerPool;
pub use queue::TaskQueue;
pub use stats::{QueueStats, StatsReceiver, StatsSender};
pub use task::{QueuePriority, Task, ThreadPriority};
