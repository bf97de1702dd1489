use std::sync::Arc;

use imagegen_core::{JobId, JobPriority};
use serde_json::Value;

use crate::broker::Broker;

/// Passed to a `consume` handler for one claimed job. Mirrors §4.D's
/// `{id, kind, payload, attempt, updateProgress(pct), log(msg)}`.
pub struct JobHandle {
    pub(crate) broker: Arc<Broker>,
    pub(crate) queue_name: String,
    pub id: JobId,
    pub kind: String,
    pub payload: Value,
    pub attempt: u32,
    pub(crate) priority: JobPriority,
}

impl JobHandle {
    /// Updates the job's progress (0..=100) and resets the visibility
    /// clock — handlers must call this at least every 30s on long jobs to
    /// avoid being declared stalled (§4.D).
    pub async fn update_progress(&self, pct: u8) {
        self.broker.record_progress(self.id, pct.min(100)).await;
    }

    pub fn log(&self, msg: &str) {
        tracing::info!(job_id = %self.id, queue = %self.queue_name, "{msg}");
    }
}
