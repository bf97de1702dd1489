//! `Job`: the broker-owned unit of work. The broker treats `payload` as
//! opaque bytes; only the Worker interprets it.

use serde::{Deserialize, Serialize};

use crate::ids::JobId;

/// Smaller numbers are dequeued earlier, ties broken by FIFO arrival.
///
/// The Orchestrator enqueues every user generation at `Normal`;
/// administrative retries use `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum JobPriority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
    VeryLow = 5,
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue_name: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub attempt: u32,
    pub state: JobState,
    pub progress: u8,
}
