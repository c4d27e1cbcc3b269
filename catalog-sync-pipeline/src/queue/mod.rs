//! Delayed, retrying in-process job queue.
//!
//! Queues are explicitly constructed values with their own defaults, so
//! independent queues can coexist (one per test, for example).

mod backoff;
mod job_queue;
mod stats;

pub use backoff::Backoff;
pub use job_queue::{Job, JobHandler, JobOptions, JobQueue, QueueSnapshot, SnapshotEntry};
pub use stats::{QueueStats, QueueStatsSnapshot};
