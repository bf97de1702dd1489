//! `GenerationOrchestrator` (§4.G): the entry point for the three
//! generation operations, and the read APIs over their records.
//!
//! Grounded on `reqactor/src/actor.rs`'s `act()` (resolve config, touch
//! the pool, hand off to the queue) and `host/src/request.rs`'s
//! validation/merge style, applied to token accounting and reference
//! resolution instead of proof inputs.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use imagegen_blobstore::{content_addressed_key, BlobStore};
use imagegen_broker::{Broker, EnqueueOptions};
use imagegen_core::{
    Actor, CoreError, CoreResult, GenerationId, GenerationRecord, JobPriority, OperationType,
    ReasonCode, RequestMetadata, Upload, UploadId, UploadPurpose, UserId,
};
use imagegen_ledger::Ledger;
use imagegen_tempstore::TempFileStore;

use crate::error::OrchestratorResult;
use crate::operations::OperationCatalog;
use crate::payload::JobPayload;
use crate::store::{GenerationPage, GenerationStore, ListFilter};
use crate::uploads::UploadStore;
use crate::validate::{sanitize_and_validate_prompt, validate_number_of_images};

pub const GENERATION_QUEUE: &str = "image-generation";

/// A reference image supplied on this request: either freshly uploaded
/// (a path to the bytes the host already wrote to scratch disk) or a
/// pointer to a previously uploaded one the caller owns.
#[derive(Debug, Clone)]
pub enum UploadInput {
    Fresh { local_path: PathBuf, mime_type: String },
    Existing { upload_id: UploadId },
}

pub struct TextToImageRequest {
    pub owner: UserId,
    pub prompt: String,
    pub number_of_images: u32,
    pub aspect_ratio: imagegen_core::AspectRatio,
    pub project_id: Option<String>,
    pub request_id: Option<String>,
}

pub struct ImageReferenceRequest {
    pub owner: UserId,
    pub prompt: String,
    pub number_of_images: u32,
    pub aspect_ratio: imagegen_core::AspectRatio,
    pub reference_kind: imagegen_core::ReferenceKind,
    pub reference: UploadInput,
    pub project_id: Option<String>,
    pub request_id: Option<String>,
}

pub struct ImageMultiReferenceRequest {
    pub owner: UserId,
    pub prompt: String,
    pub number_of_images: u32,
    pub aspect_ratio: imagegen_core::AspectRatio,
    pub target: UploadInput,
    /// 1..=5 per §4.F.
    pub references: Vec<UploadInput>,
    pub project_id: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub generation_id: GenerationId,
    pub job_id: imagegen_core::JobId,
    pub events: &'static [&'static str],
}

const GENERATION_EVENTS: &[&str] = &[
    "generation_progress",
    "generation_completed",
    "generation_failed",
    "token_balance_updated",
];

pub struct GenerationOrchestrator {
    ledger: Ledger,
    blobstore: Arc<dyn BlobStore>,
    tempstore: Arc<TempFileStore>,
    broker: Arc<Broker>,
    operations: OperationCatalog,
    pub generations: GenerationStore,
    pub uploads: UploadStore,
}

impl GenerationOrchestrator {
    pub fn new(
        ledger: Ledger,
        blobstore: Arc<dyn BlobStore>,
        tempstore: Arc<TempFileStore>,
        broker: Arc<Broker>,
        operations: OperationCatalog,
        generations: GenerationStore,
        uploads: UploadStore,
    ) -> Self {
        Self {
            ledger,
            blobstore,
            tempstore,
            broker,
            operations,
            generations,
            uploads,
        }
    }

    pub async fn init_schema(&self) -> OrchestratorResult<()> {
        self.operations.init_schema().await?;
        self.generations.init_schema().await?;
        self.uploads.init_schema().await?;
        Ok(())
    }

    pub async fn submit_text_to_image(&self, req: TextToImageRequest) -> CoreResult<SubmitOutcome> {
        let prompt = sanitize_and_validate_prompt(&req.prompt)?;
        validate_number_of_images(req.number_of_images)?;
        let operation = self.resolve_operation(OperationType::TEXT_TO_IMAGE).await?;
        let total_cost = operation.tokens_per_operation as i64 * req.number_of_images as i64;
        self.check_balance(req.owner, total_cost).await?;

        let metadata = RequestMetadata {
            number_of_images: req.number_of_images,
            aspect_ratio: req.aspect_ratio,
            project_id: req.project_id,
            reference_kind: None,
            target_id: None,
            reference_ids: None,
            template_id: None,
            used_temp_file: false,
        };

        let record = self
            .create_record_and_enqueue(
                req.owner,
                &operation,
                prompt,
                metadata,
                JobPayloadExtras::default(),
            )
            .await?;
        Ok(record)
    }

    pub async fn submit_image_reference(&self, req: ImageReferenceRequest) -> CoreResult<SubmitOutcome> {
        let prompt = sanitize_and_validate_prompt(&req.prompt)?;
        validate_number_of_images(req.number_of_images)?;
        let operation = self.resolve_operation(OperationType::IMAGE_REFERENCE).await?;
        let total_cost = operation.tokens_per_operation as i64 * req.number_of_images as i64;
        self.check_balance(req.owner, total_cost).await?;

        let (upload_id, temp_id) = self
            .resolve_reference(req.owner, req.reference, UploadPurpose::ReferenceInput)
            .await?;

        let metadata = RequestMetadata {
            number_of_images: req.number_of_images,
            aspect_ratio: req.aspect_ratio,
            project_id: req.project_id,
            reference_kind: Some(req.reference_kind),
            target_id: Some(upload_id),
            reference_ids: None,
            template_id: None,
            used_temp_file: temp_id.is_some(),
        };

        let extras = JobPayloadExtras {
            reference_upload_id: Some(upload_id.into_inner()),
            temp_id,
            ..Default::default()
        };

        self.create_record_and_enqueue(req.owner, &operation, prompt, metadata, extras).await
    }

    pub async fn submit_image_multiple_reference(
        &self,
        req: ImageMultiReferenceRequest,
    ) -> CoreResult<SubmitOutcome> {
        if req.references.is_empty() || req.references.len() > 5 {
            return Err(CoreError::Validation(
                "multi-reference generation needs between 1 and 5 reference images".to_string(),
            ));
        }
        let prompt = sanitize_and_validate_prompt(&req.prompt)?;
        validate_number_of_images(req.number_of_images)?;
        let operation = self.resolve_operation(OperationType::IMAGE_MULTIPLE_REFERENCE).await?;
        let total_cost = operation.tokens_per_operation as i64 * req.number_of_images as i64;
        self.check_balance(req.owner, total_cost).await?;

        let (target_upload_id, target_temp_id) = self
            .resolve_reference(req.owner, req.target, UploadPurpose::ReferenceInput)
            .await?;

        let mut reference_upload_ids = Vec::with_capacity(req.references.len());
        let mut reference_temp_ids = Vec::with_capacity(req.references.len());
        for input in req.references {
            let (upload_id, temp_id) = self
                .resolve_reference(req.owner, input, UploadPurpose::ReferenceInput)
                .await?;
            reference_upload_ids.push(upload_id);
            reference_temp_ids.push(temp_id);
        }

        let used_temp_file = target_temp_id.is_some() || reference_temp_ids.iter().any(Option::is_some);
        let metadata = RequestMetadata {
            number_of_images: req.number_of_images,
            aspect_ratio: req.aspect_ratio,
            project_id: req.project_id,
            reference_kind: None,
            target_id: Some(target_upload_id),
            reference_ids: Some(reference_upload_ids.clone()),
            template_id: None,
            used_temp_file,
        };

        let extras = JobPayloadExtras {
            target_upload_id: Some(target_upload_id.into_inner()),
            target_temp_id,
            reference_upload_ids: reference_upload_ids.iter().map(|id| id.into_inner()).collect(),
            reference_temp_ids,
            ..Default::default()
        };

        self.create_record_and_enqueue(req.owner, &operation, prompt, metadata, extras).await
    }

    pub async fn get_generation(&self, owner: UserId, id: GenerationId) -> CoreResult<GenerationRecord> {
        self.generations
            .get(owner, id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::NotFound(format!("generation {id}")))
    }

    pub async fn list_my_generations(
        &self,
        owner: UserId,
        limit: u32,
        filter: ListFilter,
    ) -> CoreResult<GenerationPage> {
        self.generations.list(owner, limit, filter).await.map_err(CoreError::from)
    }

    async fn resolve_operation(&self, name: &str) -> CoreResult<OperationType> {
        self.operations
            .get_active(name)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::Permanent(format!("operation '{name}' is unknown or inactive")))
    }

    async fn check_balance(&self, owner: UserId, total_cost: i64) -> CoreResult<()> {
        let balance = self.ledger.get_balance(owner).await.map_err(CoreError::from)?;
        if balance.balance < total_cost {
            return Err(CoreError::InsufficientFunds {
                balance: balance.balance,
                required: total_cost,
            });
        }
        Ok(())
    }

    /// Resolves one `UploadInput` per §4.G step 4: persists fresh bytes
    /// through BlobStore and stashes a copy in TempFileStore, or verifies
    /// ownership of an existing upload.
    async fn resolve_reference(
        &self,
        owner: UserId,
        input: UploadInput,
        purpose: UploadPurpose,
    ) -> CoreResult<(UploadId, Option<Uuid>)> {
        match input {
            UploadInput::Existing { upload_id } => {
                let upload = self
                    .uploads
                    .get_owned(owner, upload_id)
                    .await
                    .map_err(CoreError::from)?
                    .ok_or_else(|| CoreError::NotFound(format!("upload {upload_id}")))?;
                Ok((upload.id, None))
            }
            UploadInput::Fresh { local_path, mime_type } => {
                let bytes = tokio::fs::read(&local_path)
                    .await
                    .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;
                let ext = ext_for_mime(&mime_type);
                let key = content_addressed_key(&owner.to_string(), &bytes, ext);
                let put = self
                    .blobstore
                    .put(&key, bytes.clone(), &mime_type)
                    .await
                    .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;

                let upload = Upload {
                    id: UploadId::new(),
                    owner,
                    purpose,
                    mime_type: mime_type.clone(),
                    size_bytes: bytes.len() as u64,
                    storage_key: key,
                    public_url: put.public_url,
                    created_at: Utc::now(),
                };
                self.uploads.insert(&upload).await.map_err(CoreError::from)?;

                let temp_id = self
                    .tempstore
                    .store(
                        &local_path,
                        imagegen_core::TempFileMetadata {
                            owner,
                            purpose,
                            linked_upload_id: Some(upload.id),
                        },
                        None,
                    )
                    .await
                    .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;

                Ok((upload.id, Some(temp_id.into_inner())))
            }
        }
    }

    async fn create_record_and_enqueue(
        &self,
        owner: UserId,
        operation: &OperationType,
        prompt: String,
        metadata: RequestMetadata,
        extras: JobPayloadExtras,
    ) -> CoreResult<SubmitOutcome> {
        let record = GenerationRecord::new(
            owner,
            imagegen_core::OperationId::new(),
            operation.name.clone(),
            prompt.clone(),
            metadata.clone(),
            Utc::now(),
        );
        self.generations.insert(&record).await.map_err(CoreError::from)?;

        let unit_cost = operation.tokens_per_operation as i64;
        let payload = JobPayload {
            owner_id: owner.into_inner(),
            generation_id: record.id.into_inner(),
            operation: operation.name.clone(),
            prompt,
            request_metadata: metadata,
            temp_id: extras.temp_id,
            reference_upload_id: extras.reference_upload_id,
            target_upload_id: extras.target_upload_id,
            target_temp_id: extras.target_temp_id,
            reference_upload_ids: extras.reference_upload_ids,
            reference_temp_ids: extras.reference_temp_ids,
            unit_cost,
        };

        let job_id = self
            .broker
            .enqueue(
                GENERATION_QUEUE,
                &operation.name,
                serde_json::to_value(&payload).map_err(CoreError::from)?,
                EnqueueOptions {
                    priority: JobPriority::Normal,
                    attempts: imagegen_core::GENERATION_JOB_MAX_ATTEMPTS,
                    ..EnqueueOptions::default()
                },
            )
            .await;

        Ok(SubmitOutcome {
            generation_id: record.id,
            job_id,
            events: GENERATION_EVENTS,
        })
    }

    /// Used by admin/support tooling (out of this crate's HTTP surface)
    /// to credit a user's account directly, e.g. a signup bonus.
    pub async fn credit(&self, owner: UserId, amount: i64, reason: ReasonCode) -> CoreResult<i64> {
        let result = self
            .ledger
            .credit(owner, amount, reason, None, Actor::system())
            .await
            .map_err(CoreError::from)?;
        Ok(result.balance)
    }
}

#[derive(Default)]
struct JobPayloadExtras {
    temp_id: Option<Uuid>,
    reference_upload_id: Option<Uuid>,
    target_upload_id: Option<Uuid>,
    target_temp_id: Option<Uuid>,
    reference_upload_ids: Vec<Uuid>,
    reference_temp_ids: Vec<Option<Uuid>>,
}

fn ext_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/jpeg" | "image/jpg" => "jpg",
        _ => "bin",
    }
}
