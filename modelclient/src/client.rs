//! The `ModelClient` trait: the one seam between the core and the
//! generative model itself (§1 non-goal, §4.F).
//!
//! Grounded on `reqactor/src/backend.rs`'s driver-dispatch pattern: a
//! single trait, multiple backends selected by configuration, each owning
//! its own retry/timeout policy rather than pushing that concern onto
//! callers.

use async_trait::async_trait;
use imagegen_core::CoreError;

use crate::types::{ModelOutput, ModelRequest};

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Runs one request to completion. Timeouts and retries are internal:
    /// a transient failure must surface as `CoreError::Retryable`, a
    /// permanent one (content filtered, malformed prompt the model
    /// itself rejects) as `CoreError::Permanent` — the Worker relies on
    /// that distinction to decide whether to requeue (§4.H).
    async fn generate(&self, request: ModelRequest) -> Result<ModelOutput, CoreError>;
}
