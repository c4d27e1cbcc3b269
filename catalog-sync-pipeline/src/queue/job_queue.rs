//! Job queue implementation.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::stats::{QueueStats, QueueStatsSnapshot};
use crate::errors::PipelineError;

/// Per-job scheduling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Delay before the first run.
    pub delay_ms: u64,
    /// Total runs allowed, first one included.
    pub attempts: u32,
    pub backoff: Backoff,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            attempts: 1,
            backoff: Backoff::default(),
        }
    }
}

/// A job handed to a handler.
#[derive(Debug, Clone)]
pub struct Job<T> {
    pub id: u64,
    pub payload: T,
    /// 1 on the first run, incremented on every retry.
    pub attempt: u32,
    pub options: JobOptions,
}

/// Executes jobs. An `Err` schedules a retry while attempts remain.
#[async_trait]
pub trait JobHandler<T>: Send + Sync {
    async fn handle(&self, job: &Job<T>) -> Result<(), PipelineError>;
}

struct Scheduled<T> {
    ready_at: Instant,
    seq: u64,
    id: u64,
    payload: T,
    failures: u32,
    options: JobOptions,
}

impl<T> Scheduled<T> {
    fn into_job(self) -> Job<T> {
        Job {
            id: self.id,
            payload: self.payload,
            attempt: self.failures + 1,
            options: self.options,
        }
    }
}

// Min-heap on (ready_at, seq): the earliest job sits on top.
impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.ready_at, other.seq).cmp(&(self.ready_at, self.seq))
    }
}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.ready_at, self.seq) == (other.ready_at, other.seq)
    }
}

impl<T> Eq for Scheduled<T> {}

/// A pending job as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry<T> {
    pub payload: T,
    pub failures: u32,
    pub remaining_delay_ms: u64,
    pub options: JobOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot<T> {
    pub queue: String,
    pub jobs: Vec<SnapshotEntry<T>>,
}

enum Stop {
    /// Exit once nothing is queued or running.
    Idle,
    /// Exit once the shutdown flag is set, even if it was set before the
    /// worker started.
    Signal(watch::Receiver<bool>),
}

async fn stopped(stop: &mut Stop) {
    match stop {
        Stop::Idle => std::future::pending::<()>().await,
        Stop::Signal(rx) => {
            // A dropped sender also means stop.
            let _ = rx.wait_for(|stop| *stop).await;
        }
    }
}

/// Delayed job queue with retries.
///
/// Jobs become runnable once their delay elapses and are handed to workers
/// in ready-time order. Jobs are never deduplicated or cancelled.
pub struct JobQueue<T> {
    name: String,
    defaults: JobOptions,
    heap: Mutex<BinaryHeap<Scheduled<T>>>,
    notify: Notify,
    next_seq: AtomicU64,
    in_flight: AtomicUsize,
    stats: QueueStats,
}

impl<T: Send + Sync + 'static> JobQueue<T> {
    pub fn new(name: impl Into<String>, defaults: JobOptions) -> Self {
        Self {
            name: name.into(),
            defaults,
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            next_seq: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            stats: QueueStats::default(),
        }
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.stats.snapshot()
    }

    /// Jobs waiting to run, delayed ones included.
    pub async fn pending(&self) -> usize {
        self.heap.lock().await.len()
    }

    /// Enqueue with the queue's default options.
    pub async fn add(&self, payload: T) -> u64 {
        self.add_with(payload, self.defaults).await
    }

    pub async fn add_with(&self, payload: T, options: JobOptions) -> u64 {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.schedule(Scheduled {
            ready_at: Instant::now() + Duration::from_millis(options.delay_ms),
            seq,
            id: seq,
            payload,
            failures: 0,
            options,
        })
        .await;
        QueueStats::incr(&self.stats.enqueued);
        debug!(queue = %self.name, job_id = seq, delay_ms = options.delay_ms, "Job enqueued");
        seq
    }

    async fn schedule(&self, entry: Scheduled<T>) {
        self.heap.lock().await.push(entry);
        self.notify.notify_waiters();
    }

    /// Wait for the next runnable job. `None` means the worker should exit.
    async fn next_job(&self, stop: &mut Stop) -> Option<Job<T>> {
        loop {
            // Registered before inspecting the heap so a concurrent push
            // cannot slip between the check and the wait.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait_until = {
                let mut heap = self.heap.lock().await;
                match heap.peek().map(|entry| entry.ready_at) {
                    Some(ready_at) if ready_at <= Instant::now() => {
                        if let Some(entry) = heap.pop() {
                            self.in_flight.fetch_add(1, AtomicOrdering::SeqCst);
                            return Some(entry.into_job());
                        }
                        None
                    }
                    Some(ready_at) => Some(ready_at),
                    None => {
                        if matches!(stop, Stop::Idle)
                            && self.in_flight.load(AtomicOrdering::SeqCst) == 0
                        {
                            return None;
                        }
                        None
                    }
                }
            };

            match wait_until {
                Some(ready_at) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep_until(ready_at) => {}
                        _ = stopped(stop) => return None,
                    }
                }
                None => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = stopped(stop) => return None,
                    }
                }
            }
        }
    }

    async fn finish(&self, job: Job<T>, result: Result<(), PipelineError>) {
        match result {
            Ok(()) => {
                QueueStats::incr(&self.stats.succeeded);
                debug!(queue = %self.name, job_id = job.id, attempt = job.attempt, "Job succeeded");
            }
            Err(e) if job.attempt < job.options.attempts => {
                let delay = job.options.backoff.delay(job.attempt);
                QueueStats::incr(&self.stats.retried);
                warn!(
                    queue = %self.name,
                    job_id = job.id,
                    attempt = job.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Job failed, retrying"
                );
                let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
                self.schedule(Scheduled {
                    ready_at: Instant::now() + delay,
                    seq,
                    id: job.id,
                    payload: job.payload,
                    failures: job.attempt,
                    options: job.options,
                })
                .await;
            }
            Err(e) => {
                QueueStats::incr(&self.stats.failed);
                error!(
                    queue = %self.name,
                    job_id = job.id,
                    attempts = job.attempt,
                    error = %e,
                    "Job failed permanently"
                );
            }
        }

        self.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn work<H>(&self, worker: usize, handler: &H, mut stop: Stop)
    where
        H: JobHandler<T> + ?Sized,
    {
        while let Some(job) = self.next_job(&mut stop).await {
            QueueStats::incr(&self.stats.run);
            // A panicking handler counts as a failed attempt so `in_flight`
            // is always released.
            let result = AssertUnwindSafe(handler.handle(&job))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(PipelineError::queue("job handler panicked")));
            self.finish(job, result).await;
        }
        debug!(queue = %self.name, worker, "Worker stopped");
    }

    async fn run_workers<H>(self: &Arc<Self>, handler: Arc<H>, stops: Vec<Stop>)
    where
        H: JobHandler<T> + ?Sized + 'static,
    {
        let workers = stops.into_iter().enumerate().map(|(worker, stop)| {
            let queue = Arc::clone(self);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { queue.work(worker, handler.as_ref(), stop).await })
        });

        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!(queue = %self.name, error = %e, "Worker task panicked");
            }
        }
    }

    /// Run `concurrency` workers until `shutdown` turns true. Jobs already
    /// running finish first; pending jobs stay queued.
    pub async fn process<H>(
        self: &Arc<Self>,
        handler: Arc<H>,
        concurrency: usize,
        shutdown: watch::Receiver<bool>,
    ) where
        H: JobHandler<T> + ?Sized + 'static,
    {
        info!(queue = %self.name, concurrency, "Processing queue");
        let stops = (0..concurrency.max(1))
            .map(|_| Stop::Signal(shutdown.clone()))
            .collect();
        self.run_workers(handler, stops).await;
        let pending = self.pending().await;
        info!(queue = %self.name, pending, "Queue processing stopped");
    }

    /// Run workers until every job, retries included, has finished.
    pub async fn run_until_idle<H>(self: &Arc<Self>, handler: Arc<H>, concurrency: usize)
    where
        H: JobHandler<T> + ?Sized + 'static,
    {
        let stops = (0..concurrency.max(1)).map(|_| Stop::Idle).collect();
        self.run_workers(handler, stops).await;
    }
}

impl<T: Clone + Send + Sync + 'static> JobQueue<T> {
    /// Pending jobs in ready order with their remaining delay.
    pub async fn snapshot(&self) -> QueueSnapshot<T> {
        let heap = self.heap.lock().await;
        let now = Instant::now();

        let mut entries: Vec<&Scheduled<T>> = heap.iter().collect();
        entries.sort_by_key(|entry| (entry.ready_at, entry.seq));

        QueueSnapshot {
            queue: self.name.clone(),
            jobs: entries
                .into_iter()
                .map(|entry| SnapshotEntry {
                    payload: entry.payload.clone(),
                    failures: entry.failures,
                    remaining_delay_ms: entry.ready_at.saturating_duration_since(now).as_millis()
                        as u64,
                    options: entry.options,
                })
                .collect(),
        }
    }

    /// Re-enqueue jobs from a snapshot, keeping attempt counts and delays.
    pub async fn restore(&self, snapshot: QueueSnapshot<T>) -> usize {
        let count = snapshot.jobs.len();
        let now = Instant::now();
        {
            let mut heap = self.heap.lock().await;
            for entry in snapshot.jobs {
                let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
                heap.push(Scheduled {
                    ready_at: now + Duration::from_millis(entry.remaining_delay_ms),
                    seq,
                    id: seq,
                    payload: entry.payload,
                    failures: entry.failures,
                    options: entry.options,
                });
            }
        }
        self.notify.notify_waiters();
        info!(queue = %self.name, count, "Restored queued jobs");
        count
    }
}

impl<T> JobQueue<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Write pending jobs to `path` as JSON.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<usize, PipelineError> {
        let snapshot = self.snapshot().await;
        let count = snapshot.jobs.len();
        let raw = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path.as_ref(), raw).await?;
        info!(queue = %self.name, count, path = %path.as_ref().display(), "Saved queue snapshot");
        Ok(count)
    }

    /// Restore jobs from a snapshot file and remove it. A missing file
    /// restores nothing.
    pub async fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<usize, PipelineError> {
        let path = path.as_ref();
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let snapshot: QueueSnapshot<T> = serde_json::from_slice(&raw)?;
        if snapshot.queue != self.name {
            return Err(PipelineError::snapshot(format!(
                "snapshot belongs to queue {}, not {}",
                snapshot.queue, self.name
            )));
        }

        let count = self.restore(snapshot).await;
        tokio::fs::remove_file(path).await?;
        Ok(count)
    }
}
