//! Wire-level event payloads the hub emits (§4.E).

use chrono::{DateTime, Utc};
use imagegen_core::{GenerationId, ReasonCode, UserId};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PushEvent {
    UserOnline {
        user_id: UserId,
    },
    UserOffline {
        user_id: UserId,
    },
    GenerationProgress {
        generation_id: GenerationId,
        progress: u8,
        message: String,
        timestamp: DateTime<Utc>,
    },
    GenerationCompleted {
        generation_id: GenerationId,
        result: GenerationResult,
        timestamp: DateTime<Utc>,
    },
    GenerationFailed {
        generation_id: GenerationId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    TokenBalanceUpdated {
        balance: i64,
        delta: i64,
        reason_code: ReasonCode,
        transaction_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    Unauthorized,
    RateLimit {
        code: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub images: Vec<ImageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub image_id: Uuid,
    pub public_url: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl PushEvent {
    /// `true` for one of the two terminal events a `generationId` emits
    /// exactly once over its lifetime (§8 invariant 6).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PushEvent::GenerationCompleted { .. } | PushEvent::GenerationFailed { .. }
        )
    }
}
