//! The Broker (§4.D): named FIFO queues with priority lanes, delayed
//! retry, per-queue concurrency, and progress/state events.
//!
//! Grounded on `reqactor/src/queue.rs`'s `Queue` (priority-lane `VecDeque`
//! design, generalized from 3 fixed lanes to the spec's 5 `JobPriority`
//! levels) and `reqactor/src/actor.rs`'s `serve_in_background` loop
//! (semaphore-bounded `tokio::spawn`, panic-safe terminal-state writes).
//! In-process only, consistent with §5's non-goal of distributed
//! consensus: state lives behind `Arc<Mutex<..>>`, not a crash-durable
//! store.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use imagegen_core::{CoreError, Job, JobId, JobState};
use serde_json::Value;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;

use crate::error::{BrokerError, BrokerResult};
use crate::queue::NamedQueue;
use crate::record::{EnqueueOptions, JobRecord};
use crate::JobHandle;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, CoreError>> + Send>>;
pub type Handler = Arc<dyn Fn(JobHandle) -> HandlerFuture + Send + Sync>;

/// Default visibility timeout: a claimed job that reports no progress for
/// this long is declared stalled and re-queued (§4.D).
pub const DEFAULT_VISIBILITY_TIMEOUT: StdDuration = StdDuration::from_secs(60);
const SCHEDULER_TICK: StdDuration = StdDuration::from_millis(250);

pub struct Broker {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    queues: Mutex<HashMap<String, NamedQueue>>,
    notify: Notify,
    visibility_timeout: StdDuration,
}

impl Broker {
    pub fn new() -> Arc<Self> {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: StdDuration) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            visibility_timeout,
        })
    }

    /// Starts the background tasks that promote delayed/backoff-held jobs
    /// once ready, and re-queue stalled claims. Call once per process.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> JoinHandle<()> {
        let broker = self.clone();
        tokio::spawn(async move {
            loop {
                broker.tick().await;
                tokio::time::sleep(SCHEDULER_TICK).await;
            }
        })
    }

    async fn tick(&self) {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;
        let mut queues = self.queues.lock().await;

        let mut became_ready = Vec::new();
        let mut stalled = Vec::new();
        let mut expired = Vec::new();

        for (id, record) in jobs.iter_mut() {
            match record.job.state {
                JobState::Waiting | JobState::Delayed if record.is_ready(now) => {
                    became_ready.push((*id, record.job.queue_name.clone(), record.priority));
                }
                JobState::Active => {
                    let elapsed = now - record.last_seen_at;
                    if elapsed.num_seconds() as u64 >= self.visibility_timeout.as_secs() {
                        stalled.push(*id);
                    }
                }
                _ if record.retention_expired(now) => expired.push(*id),
                _ => {}
            }
        }

        for (id, queue_name, priority) in became_ready {
            if let Some(record) = jobs.get_mut(&id) {
                record.job.state = JobState::Waiting;
            }
            queues
                .entry(queue_name)
                .or_insert_with(NamedQueue::new)
                .push_ready(id, priority);
        }

        for id in stalled {
            if let Some(record) = jobs.get_mut(&id) {
                tracing::warn!(job_id = %id, "job stalled past visibility timeout, re-queueing");
                record.job.state = JobState::Waiting;
                record.job.progress = record.job.progress.min(99);
                queues
                    .entry(record.job.queue_name.clone())
                    .or_insert_with(NamedQueue::new)
                    .push_ready(id, record.priority);
            }
        }

        for id in expired {
            jobs.remove(&id);
        }

        drop(queues);
        drop(jobs);
        self.notify.notify_waiters();
    }

    pub async fn enqueue(
        &self,
        queue_name: &str,
        kind: &str,
        payload: Value,
        options: EnqueueOptions,
    ) -> JobId {
        let id = JobId::new();
        let now = Utc::now();
        let record = JobRecord::new(id, queue_name.to_string(), kind.to_string(), payload, &options, now);
        let priority = record.priority;
        let ready_now = record.is_ready(now);

        self.jobs.lock().await.insert(id, record);
        if ready_now {
            self.queues
                .lock()
                .await
                .entry(queue_name.to_string())
                .or_insert_with(NamedQueue::new)
                .push_ready(id, priority);
        }
        self.notify.notify_waiters();
        id
    }

    pub async fn get_job(&self, job_id: JobId) -> Option<Job> {
        self.jobs.lock().await.get(&job_id).map(|r| r.job.clone())
    }

    /// Forces a job back to `waiting` regardless of its current state, at
    /// `High` priority — the priority administrative retries use (§4.D).
    pub async fn retry(&self, job_id: JobId) -> BrokerResult<()> {
        let mut jobs = self.jobs.lock().await;
        let record = jobs.get_mut(&job_id).ok_or(BrokerError::NotFound(job_id.into_inner()))?;
        record.job.state = JobState::Waiting;
        record.job.progress = 0;
        record.ready_at = Utc::now();
        record.priority = imagegen_core::JobPriority::High;
        let (queue_name, priority) = (record.job.queue_name.clone(), record.priority);
        drop(jobs);

        self.queues
            .lock()
            .await
            .entry(queue_name)
            .or_insert_with(NamedQueue::new)
            .push_ready(job_id, priority);
        self.notify.notify_waiters();
        Ok(())
    }

    pub(crate) async fn record_progress(&self, job_id: JobId, pct: u8) {
        if let Some(record) = self.jobs.lock().await.get_mut(&job_id) {
            record.job.progress = pct;
            record.last_seen_at = Utc::now();
        }
    }

    async fn claim_next(&self, queue_name: &str) -> Option<(JobId, String, Value, u32, imagegen_core::JobPriority)> {
        let id = {
            let mut queues = self.queues.lock().await;
            let queue = queues.get_mut(queue_name)?;
            queue.pop_next()
        }?;

        let mut jobs = self.jobs.lock().await;
        let record = jobs.get_mut(&id)?;
        record.job.state = JobState::Active;
        record.claimed_at = Some(Utc::now());
        record.last_seen_at = Utc::now();
        Some((
            id,
            record.job.kind.clone(),
            record.job.payload.clone(),
            record.job.attempt,
            record.priority,
        ))
    }

    async fn finish_success(&self, job_id: JobId, result: Value) {
        if let Some(record) = self.jobs.lock().await.get_mut(&job_id) {
            record.job.state = JobState::Completed;
            record.job.progress = 100;
            record.completed_at = Some(Utc::now());
            record.result = Some(result);
        }
    }

    async fn finish_failure(&self, job_id: JobId, error: CoreError) {
        let mut jobs = self.jobs.lock().await;
        let Some(record) = jobs.get_mut(&job_id) else {
            return;
        };

        if error.is_retryable() && record.job.attempt < record.attempts_max {
            let delay = record.backoff_delay();
            record.job.attempt += 1;
            record.job.state = JobState::Delayed;
            record.ready_at = Utc::now() + delay;
            record.last_seen_at = Utc::now();
            tracing::info!(
                job_id = %job_id,
                attempt = record.job.attempt,
                "retryable failure, re-queueing after backoff"
            );
        } else {
            record.job.state = JobState::Failed;
            record.completed_at = Some(Utc::now());
            record.error = Some(error.to_string());
        }
    }

    /// Registers a worker pool for `queue_name`: spawns a background task
    /// that claims jobs and runs `handler` on up to `concurrency` of them
    /// at once. Returns immediately; the pool runs until the broker (and
    /// this handle) is dropped.
    pub fn consume(
        self: &Arc<Self>,
        queue_name: impl Into<String>,
        concurrency: usize,
        handler: Handler,
    ) -> JoinHandle<()> {
        let broker = self.clone();
        let queue_name = queue_name.into();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        tokio::spawn(async move {
            loop {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let claimed = broker.claim_next(&queue_name).await;
                let Some((id, kind, payload, attempt, priority)) = claimed else {
                    drop(permit);
                    tokio::select! {
                        _ = broker.notify.notified() => {}
                        _ = tokio::time::sleep(StdDuration::from_millis(200)) => {}
                    }
                    continue;
                };

                let broker = broker.clone();
                let queue_name_for_task = queue_name.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let handle = JobHandle {
                        broker: broker.clone(),
                        queue_name: queue_name_for_task,
                        id,
                        kind,
                        payload,
                        attempt,
                        priority,
                    };

                    // Panic-safety mirrors the teacher's actor loop: a
                    // handler panic must not crash the pool, it finalizes
                    // the job as failed instead.
                    match tokio::spawn((handler)(handle)).await {
                        Ok(Ok(result)) => broker.finish_success(id, result).await,
                        Ok(Err(error)) => broker.finish_failure(id, error).await,
                        Err(join_error) => {
                            broker
                                .finish_failure(id, CoreError::Internal(anyhow::anyhow!(join_error)))
                                .await
                        }
                    }
                });
            }
        })
    }
}
