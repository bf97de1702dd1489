use chrono::{DateTime, Duration, Utc};
use imagegen_core::{Job, JobId, JobPriority, JobState};
use serde_json::Value;

/// Options accepted by `Broker::enqueue`, mirroring §4.D's `options`.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub priority: JobPriority,
    pub attempts: u32,
    /// Base of the exponential backoff applied between retries.
    pub backoff_base: Duration,
    /// Initial hold before the job becomes ready for the first time.
    pub delay: Duration,
    pub ttl_completed: Duration,
    pub ttl_failed: Duration,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: JobPriority::Normal,
            attempts: 3,
            backoff_base: Duration::seconds(2),
            delay: Duration::zero(),
            ttl_completed: Duration::hours(24),
            ttl_failed: Duration::days(7),
        }
    }
}

/// The broker's full bookkeeping record for a job; `Broker::get_job` exposes
/// only the public `Job` snapshot carved out of this.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job: Job,
    pub priority: JobPriority,
    pub attempts_max: u32,
    pub backoff_base: Duration,
    pub ttl_completed: Duration,
    pub ttl_failed: Duration,
    /// When this job next becomes eligible for delivery (enqueue time,
    /// or backoff/delay expiry).
    pub ready_at: DateTime<Utc>,
    /// Set when a consumer claims the job; cleared on completion/failure.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Bumped by `JobHandle::update_progress`; used by the visibility
    /// sweep to detect a stalled handler.
    pub last_seen_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(
        id: JobId,
        queue_name: String,
        kind: String,
        payload: Value,
        options: &EnqueueOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job: Job {
                id,
                queue_name,
                kind,
                payload,
                attempt: 1,
                state: if options.delay > Duration::zero() {
                    JobState::Delayed
                } else {
                    JobState::Waiting
                },
                progress: 0,
            },
            priority: options.priority,
            attempts_max: options.attempts.max(1),
            backoff_base: options.backoff_base,
            ttl_completed: options.ttl_completed,
            ttl_failed: options.ttl_failed,
            ready_at: now + options.delay,
            claimed_at: None,
            last_seen_at: now,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        matches!(self.job.state, JobState::Waiting | JobState::Delayed) && self.ready_at <= now
    }

    /// Exponential backoff capped at ~10 minutes, base configured at enqueue time.
    pub fn backoff_delay(&self) -> Duration {
        let factor = 2i64.saturating_pow(self.job.attempt.saturating_sub(1));
        let delay = self.backoff_base * factor.clamp(1, i32::MAX as i64) as i32;
        delay.min(Duration::minutes(10))
    }

    pub fn retention_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.job.state, self.completed_at) {
            (JobState::Completed, Some(at)) => now - at > self.ttl_completed,
            (JobState::Failed, Some(at)) => now - at > self.ttl_failed,
            _ => false,
        }
    }
}
