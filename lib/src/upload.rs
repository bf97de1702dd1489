//! `Upload`: a stored image, whether a user-provided reference or a
//! generation output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{UploadId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPurpose {
    ReferenceInput,
    GenerationOutput,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub owner: UserId,
    pub purpose: UploadPurpose,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Opaque to clients; only `BlobStore` interprets it.
    pub storage_key: String,
    pub public_url: String,
    pub created_at: DateTime<Utc>,
}
