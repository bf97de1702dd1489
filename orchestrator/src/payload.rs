//! The wire shape of a job's `payload` (§4.G step 7): opaque to the
//! Broker, interpreted only by the Worker that claims it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use imagegen_core::RequestMetadata;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub owner_id: Uuid,
    pub generation_id: Uuid,
    pub operation: String,
    pub prompt: String,
    pub request_metadata: RequestMetadata,
    /// Present when a reference/target was resolved via TempFileStore;
    /// the Worker tries this before falling back to BlobStore (§4.H step 2).
    pub temp_id: Option<Uuid>,
    /// The stable Upload backing the (single) reference image, if any.
    pub reference_upload_id: Option<Uuid>,
    /// Multi-reference: target plus 1..=5 references, each resolved to a
    /// stable Upload id and (if freshly uploaded this request) a temp id.
    pub target_upload_id: Option<Uuid>,
    pub target_temp_id: Option<Uuid>,
    pub reference_upload_ids: Vec<Uuid>,
    pub reference_temp_ids: Vec<Option<Uuid>>,
    pub unit_cost: i64,
}
