//! Request/response shapes shared by every `ModelClient` implementation.

use imagegen_core::ReferenceKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form generation knobs that don't affect billing (seed, guidance
/// scale, ...). Forwarded to the model verbatim; the core never inspects
/// them beyond passing them through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOptions {
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub extra: Value,
}

#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub bytes: Vec<u8>,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone)]
pub enum ModelRequest {
    TextToImage {
        prompt: String,
        options: ModelOptions,
    },
    ImageToImage {
        prompt: String,
        reference: ReferenceImage,
        options: ModelOptions,
    },
    MultiReferenceToImage {
        prompt: String,
        target: Vec<u8>,
        /// 1..=5 per §4.F; callers validate the bound before construction.
        references: Vec<Vec<u8>>,
        options: ModelOptions,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub model_version: String,
    pub generation_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub metadata: ModelMetadata,
}
