//! `GenerationRecord` and the types that make up its request metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GenerationId, OperationId, UploadId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "3:4")]
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Subject,
    Face,
    FullImage,
}

/// The request-shaped parameters carried alongside a `GenerationRecord`,
/// exactly as submitted (minus the prompt text, which has its own field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub number_of_images: u32,
    pub aspect_ratio: AspectRatio,
    pub project_id: Option<String>,
    pub reference_kind: Option<ReferenceKind>,
    pub target_id: Option<UploadId>,
    pub reference_ids: Option<Vec<UploadId>>,
    pub template_id: Option<String>,
    /// Set by the Worker when the reference bytes were served from the
    /// TempFileStore instead of BlobStore (§4.H step 2).
    #[serde(default)]
    pub used_temp_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Timings {
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_ms: Option<i64>,
}

/// One per user request, regardless of how many images the request produces.
///
/// Created by the Orchestrator; mutated only by the Worker that claimed its
/// job; never deleted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: GenerationId,
    pub owner: UserId,
    pub operation: OperationId,
    pub operation_name: String,
    pub prompt: String,
    pub request_metadata: RequestMetadata,
    pub status: GenerationStatus,
    /// 0..=100, monotonically non-decreasing, capped at 99 until terminal.
    pub progress: u8,
    pub tokens_charged: i64,
    pub outputs: Vec<UploadId>,
    pub error: Option<String>,
    pub timings: Timings,
}

impl GenerationRecord {
    pub fn new(
        owner: UserId,
        operation: OperationId,
        operation_name: String,
        prompt: String,
        request_metadata: RequestMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: GenerationId::new(),
            owner,
            operation,
            operation_name,
            prompt,
            request_metadata,
            status: GenerationStatus::Pending,
            progress: 0,
            tokens_charged: 0,
            outputs: Vec::new(),
            error: None,
            timings: Timings {
                created_at: Some(created_at),
                ..Default::default()
            },
        }
    }

    /// Invariant from §3: `status = completed ⇒ outputs.len() ==
    /// requestMetadata.numberOfImages ∧ tokensCharged == unitCost *
    /// numberOfImages`. Checked in tests, not enforced at runtime here since
    /// the Worker is the sole writer and assembles both fields together.
    pub fn is_paid_completion_consistent(&self, unit_cost: i64) -> bool {
        match self.status {
            GenerationStatus::Completed => {
                self.outputs.len() as u32 == self.request_metadata.number_of_images
                    && self.tokens_charged == unit_cost * self.request_metadata.number_of_images as i64
            }
            GenerationStatus::Failed => self.tokens_charged == 0,
            _ => true,
        }
    }
}
