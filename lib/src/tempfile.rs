//! `TempFile`: an in-memory registry entry backed by a file on local disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::{TempFileId, UploadId, UserId};
use crate::upload::UploadPurpose;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempFileMetadata {
    pub owner: UserId,
    pub purpose: UploadPurpose,
    pub linked_upload_id: Option<UploadId>,
}

/// Invariant: while `id` is present in the owning registry and
/// `now <= expires_at`, the file at `local_path` exists; the entry and the
/// file are always removed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempFile {
    pub id: TempFileId,
    pub local_path: PathBuf,
    pub expires_at: DateTime<Utc>,
    pub metadata: TempFileMetadata,
}
