//! The generation job handler (§4.H): claim, resolve reference bytes,
//! build the prompt, call the model per requested image, persist outputs,
//! charge, finalize, clean up. One `GenerationRecord` per job, mutated only
//! here.
//!
//! Grounded on `reqactor/src/actor_inner.rs`'s single claim-work-finalize
//! function per job, generalized from proving a block to generating images.

use std::sync::Arc;

use chrono::Utc;
use imagegen_broker::JobHandle;
use imagegen_core::{
    Actor, CoreError, GenerationId, ReasonCode, TempFileId, Upload, UploadId, UploadPurpose,
    UserId, GENERATION_JOB_MAX_ATTEMPTS,
};
use imagegen_ledger::{Ledger, LedgerError};
use imagegen_blobstore::{BlobStore, BlobStoreError};
use imagegen_modelclient::{ModelClient, ModelOptions, ModelOutput, ModelRequest, ReferenceImage};
use imagegen_orchestrator::{GenerationStore, JobPayload, UploadStore};
use imagegen_pushhub::{GenerationResult, ImageSummary, PushEvent, PushHub};
use imagegen_tempstore::TempFileStore;
use serde_json::Value;

use crate::error::{permanent, retryable};

pub struct GenerationWorker {
    pub generations: GenerationStore,
    pub uploads: UploadStore,
    pub blobstore: Arc<dyn BlobStore>,
    pub tempstore: Arc<TempFileStore>,
    pub modelclient: Arc<dyn ModelClient>,
    pub ledger: Ledger,
    pub pushhub: Arc<PushHub>,
}

impl GenerationWorker {
    pub fn new(
        generations: GenerationStore,
        uploads: UploadStore,
        blobstore: Arc<dyn BlobStore>,
        tempstore: Arc<TempFileStore>,
        modelclient: Arc<dyn ModelClient>,
        ledger: Ledger,
        pushhub: Arc<PushHub>,
    ) -> Arc<Self> {
        Arc::new(Self {
            generations,
            uploads,
            blobstore,
            tempstore,
            modelclient,
            ledger,
            pushhub,
        })
    }

    /// Runs the full state machine for one claimed job. The final
    /// `TempFileStore` cleanup always runs, win or lose — a missing temp
    /// entry is never an error (§7), so there's nothing lost by cleaning up
    /// before a retry falls back to `BlobStore`.
    pub async fn process(&self, handle: JobHandle) -> Result<Value, CoreError> {
        let payload: JobPayload = serde_json::from_value(handle.payload.clone())?;
        let owner = UserId::from(payload.owner_id);
        let generation_id = GenerationId::from(payload.generation_id);

        let outcome = self.run(&handle, &payload, owner, generation_id).await;

        if let Some(temp_id) = payload.temp_id {
            let _ = self.tempstore.cleanup(TempFileId::from(temp_id)).await;
        }
        if let Some(temp_id) = payload.target_temp_id {
            let _ = self.tempstore.cleanup(TempFileId::from(temp_id)).await;
        }
        for temp_id in payload.reference_temp_ids.iter().flatten() {
            let _ = self.tempstore.cleanup(TempFileId::from(*temp_id)).await;
        }

        outcome
    }

    async fn run(
        &self,
        handle: &JobHandle,
        payload: &JobPayload,
        owner: UserId,
        generation_id: GenerationId,
    ) -> Result<Value, CoreError> {
        // Step 1: claim.
        let started_at = Utc::now();
        self.generations
            .mark_processing(generation_id, started_at)
            .await
            .map_err(|e| retryable("generation store", e))?;
        self.advance(handle, owner, generation_id, 1, "queued").await;

        // Step 2: resolve reference bytes.
        let references = match self.resolve_references(payload).await {
            Ok(references) => references,
            Err(error) => return self.handle_error(handle, owner, generation_id, error).await,
        };
        self.advance(handle, owner, generation_id, 10, "preparing references").await;

        // Step 3: prompt preparation.
        let prompt = crate::prompt::build_prompt(&payload.prompt, payload.request_metadata.reference_kind);
        self.advance(handle, owner, generation_id, 20, "prompt ready").await;

        // Step 4: per-image model loop.
        let number_of_images = payload.request_metadata.number_of_images.max(1);
        let mut outputs = Vec::with_capacity(number_of_images as usize);
        for i in 1..=number_of_images {
            let request = self.build_model_request(payload, &prompt, &references);
            let generated = match self.modelclient.generate(request).await {
                Ok(output) => output,
                Err(error) => return self.handle_error(handle, owner, generation_id, error).await,
            };
            outputs.push(generated);

            let pct = (20 + (60 * i / number_of_images).min(60)) as u8;
            self.advance(handle, owner, generation_id, pct, "rendering").await;
        }

        // Step 5: persist outputs.
        let upload_ids = match self.persist_outputs(owner, generation_id, &outputs).await {
            Ok(ids) => ids,
            Err(error) => return self.handle_error(handle, owner, generation_id, error).await,
        };
        self.advance(handle, owner, generation_id, 85, "saving outputs").await;

        // Step 6: charge.
        let total_cost = payload.unit_cost * number_of_images as i64;
        let reason_code: ReasonCode = payload
            .operation
            .parse()
            .unwrap_or(ReasonCode::Adjustment);
        let idempotency_key = format!("gen:{generation_id}");
        let charge = self
            .ledger
            .debit_with_metadata(
                owner,
                total_cost,
                reason_code,
                Some(&idempotency_key),
                Actor::system(),
                Some(imagegen_core::TransactionMetadata::generation(generation_id.into_inner())),
            )
            .await;

        let charge = match charge {
            Ok(result) => result,
            Err(LedgerError::InsufficientFunds { balance, required }) => {
                // Outputs already produced stay in BlobStore/UploadStore;
                // the generation itself is not billed. The balance won't
                // change by retrying, so this is terminal regardless of
                // attempts remaining.
                return self
                    .fail(
                        owner,
                        generation_id,
                        CoreError::InsufficientFunds { balance, required },
                    )
                    .await;
            }
            Err(error) => {
                return self
                    .handle_error(handle, owner, generation_id, retryable("ledger debit", error))
                    .await
            }
        };

        self.pushhub.emit_to_user(
            owner,
            PushEvent::TokenBalanceUpdated {
                balance: charge.balance,
                delta: -total_cost,
                reason_code,
                transaction_id: charge.transaction_id,
                timestamp: Utc::now(),
            },
        );

        // Step 7: finalize success.
        let completed_at = Utc::now();
        let processing_ms = (completed_at - started_at).num_milliseconds().max(0);
        self.generations
            .mark_completed(generation_id, &upload_ids, total_cost, completed_at, processing_ms)
            .await
            .map_err(|e| retryable("generation store", e))?;

        let images = self.summarize_outputs(&upload_ids).await;
        self.pushhub.emit_to_user(
            owner,
            PushEvent::GenerationCompleted {
                generation_id,
                result: GenerationResult { images },
                timestamp: completed_at,
            },
        );

        Ok(serde_json::json!({ "generationId": generation_id, "outputs": upload_ids }))
    }

    /// Dispatches a step failure: a `Retryable` error on an attempt that
    /// the broker will still retry (`handle.attempt < GENERATION_JOB_MAX_ATTEMPTS`,
    /// mirroring `Broker::finish_failure`'s own threshold) is propagated
    /// as-is, leaving the `GenerationRecord` at `processing` for the next
    /// attempt. Anything else — a `Permanent` error, or a `Retryable` one
    /// on the last attempt — finalizes the record as failed (step 8).
    async fn handle_error(
        &self,
        handle: &JobHandle,
        owner: UserId,
        generation_id: GenerationId,
        error: CoreError,
    ) -> Result<Value, CoreError> {
        if error.is_retryable() && handle.attempt < GENERATION_JOB_MAX_ATTEMPTS {
            return Err(error);
        }
        self.fail(owner, generation_id, error).await
    }

    /// Step 8: finalizes the `GenerationRecord` as failed and notifies the
    /// owner. No charge is ever made for a failed generation.
    async fn fail(&self, owner: UserId, generation_id: GenerationId, error: CoreError) -> Result<Value, CoreError> {
        let message = format!("{}: {error}", error.kind());
        let _ = self.generations.mark_failed(generation_id, &message, Utc::now()).await;
        self.pushhub.emit_to_user(
            owner,
            PushEvent::GenerationFailed {
                generation_id,
                error: message,
                timestamp: Utc::now(),
            },
        );
        Err(error)
    }

    /// Advances a job's progress on both the in-memory `JobHandle` (so the
    /// broker doesn't declare it stalled) and the persisted
    /// `GenerationRecord` (so a poller sees the same number), then
    /// notifies the owner. A failure to persist is logged, not fatal — the
    /// in-memory and pushed progress are still accurate.
    async fn advance(&self, handle: &JobHandle, owner: UserId, generation_id: GenerationId, progress: u8, message: &str) {
        handle.update_progress(progress).await;
        if let Err(error) = self.generations.update_progress(generation_id, progress).await {
            tracing::warn!(%generation_id, progress, %error, "failed to persist generation progress");
        }
        self.emit_progress(owner, generation_id, progress, message);
    }

    fn emit_progress(&self, owner: UserId, generation_id: GenerationId, progress: u8, message: &str) {
        self.pushhub.emit_to_user(
            owner,
            PushEvent::GenerationProgress {
                generation_id,
                progress,
                message: message.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    async fn resolve_references(&self, payload: &JobPayload) -> Result<ResolvedReferences, CoreError> {
        match payload.operation.as_str() {
            "image_reference" => {
                let bytes = self
                    .resolve_one(payload.temp_id, payload.reference_upload_id)
                    .await?;
                let kind = payload
                    .request_metadata
                    .reference_kind
                    .unwrap_or(imagegen_core::ReferenceKind::Subject);
                Ok(ResolvedReferences::Single { bytes, kind })
            }
            "image_multiple_reference" => {
                let target = self
                    .resolve_one(payload.target_temp_id, payload.target_upload_id)
                    .await?;

                let mut references = Vec::with_capacity(payload.reference_upload_ids.len());
                for (i, upload_id) in payload.reference_upload_ids.iter().enumerate() {
                    let temp_id = payload.reference_temp_ids.get(i).copied().flatten();
                    references.push(self.resolve_one(temp_id, Some(*upload_id)).await?);
                }
                Ok(ResolvedReferences::Multi { target, references })
            }
            _ => Ok(ResolvedReferences::None),
        }
    }

    /// Tries the `TempFileStore` copy first (no network round-trip), falls
    /// back to `BlobStore` by the upload's stored key. Missing both is a
    /// permanent failure — there is nothing to generate from.
    async fn resolve_one(
        &self,
        temp_id: Option<uuid::Uuid>,
        upload_id: Option<uuid::Uuid>,
    ) -> Result<Vec<u8>, CoreError> {
        if let Some(temp_id) = temp_id {
            if let Some(path) = self.tempstore.get_path(TempFileId::from(temp_id)).await {
                if let Ok(bytes) = tokio::fs::read(&path).await {
                    return Ok(bytes);
                }
            }
        }

        let Some(upload_id) = upload_id else {
            return Err(permanent("reference resolution", "no reference input was recorded for this job"));
        };

        let upload = self
            .uploads
            .get(UploadId::from(upload_id))
            .await
            .map_err(|e| retryable("upload store", e))?
            .ok_or_else(|| permanent("reference resolution", format!("upload {upload_id} no longer exists")))?;

        self.blobstore
            .get(&upload.storage_key)
            .await
            .map_err(classify_blobstore_error)
    }

    fn build_model_request(&self, _payload: &JobPayload, prompt: &str, references: &ResolvedReferences) -> ModelRequest {
        let options = ModelOptions::default();
        match references {
            ResolvedReferences::None => ModelRequest::TextToImage {
                prompt: prompt.to_string(),
                options,
            },
            ResolvedReferences::Single { bytes, kind } => ModelRequest::ImageToImage {
                prompt: prompt.to_string(),
                reference: ReferenceImage {
                    bytes: bytes.clone(),
                    kind: *kind,
                },
                options,
            },
            ResolvedReferences::Multi { target, references } => ModelRequest::MultiReferenceToImage {
                prompt: prompt.to_string(),
                target: target.clone(),
                references: references.clone(),
                options,
            },
        }
    }

    async fn persist_outputs(
        &self,
        owner: UserId,
        generation_id: GenerationId,
        outputs: &[ModelOutput],
    ) -> Result<Vec<UploadId>, CoreError> {
        let mut ids = Vec::with_capacity(outputs.len());
        for (i, output) in outputs.iter().enumerate() {
            if output.bytes.is_empty() {
                return Err(permanent("model output", "model returned empty image bytes"));
            }
            let Some(ext) = ext_for_mime(&output.mime_type) else {
                return Err(permanent(
                    "model output",
                    format!("unrecognized image mime type: {}", output.mime_type),
                ));
            };
            let key = format!("{owner}/generations/{generation_id}/{}.{ext}", i + 1);
            let put = self
                .blobstore
                .put(&key, output.bytes.clone(), &output.mime_type)
                .await
                .map_err(classify_blobstore_error)?;

            let upload = Upload {
                id: UploadId::new(),
                owner,
                purpose: UploadPurpose::GenerationOutput,
                mime_type: output.mime_type.clone(),
                size_bytes: output.bytes.len() as u64,
                storage_key: key,
                public_url: put.public_url,
                created_at: Utc::now(),
            };
            self.uploads.insert(&upload).await.map_err(|e| retryable("upload store", e))?;
            ids.push(upload.id);
        }
        Ok(ids)
    }

    async fn summarize_outputs(&self, upload_ids: &[UploadId]) -> Vec<ImageSummary> {
        let mut images = Vec::with_capacity(upload_ids.len());
        for id in upload_ids {
            if let Ok(Some(upload)) = self.uploads.get(*id).await {
                images.push(ImageSummary {
                    image_id: id.into_inner(),
                    public_url: upload.public_url,
                    mime_type: upload.mime_type,
                    size_bytes: upload.size_bytes,
                });
            }
        }
        images
    }
}

enum ResolvedReferences {
    None,
    Single { bytes: Vec<u8>, kind: imagegen_core::ReferenceKind },
    Multi { target: Vec<u8>, references: Vec<Vec<u8>> },
}

/// Recognized output mime types only; anything else is ambiguous enough
/// that §9 treats it as a `PermanentError` rather than guessing.
fn ext_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        _ => None,
    }
}

fn classify_blobstore_error(error: BlobStoreError) -> CoreError {
    match error {
        BlobStoreError::NotFound(key) => permanent("blob store", format!("missing blob: {key}")),
        other => retryable("blob store", other),
    }
}
