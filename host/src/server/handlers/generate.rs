//! `/generate/*` handlers (§6): submit the three generation shapes, poll a
//! single generation, and list a caller's generation history.
//!
//! Grounded on `host/src/server/api/v2/proof/submit.rs`'s handler shape
//! (extract state + principal, delegate to the domain layer, wrap the
//! result) applied to the Orchestrator instead of the proof pipeline.

use std::str::FromStr;

use axum::extract::{Multipart, Path, Query, State};
use axum::{Extension, Json};
use imagegen_core::{AspectRatio, GenerationId, ReferenceKind};
use imagegen_orchestrator::{
    ImageMultiReferenceRequest, ImageReferenceRequest, TextToImageRequest, UploadInput,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::envelope::Envelope;
use crate::error::{HostError, HostResult};
use crate::multipart::save_field;
use crate::state::AppState;

fn default_number_of_images() -> u32 {
    1
}

fn default_aspect_ratio() -> AspectRatio {
    AspectRatio::Square
}

#[derive(Debug, Deserialize)]
pub struct TextToImageBody {
    pub prompt: String,
    #[serde(default = "default_number_of_images")]
    pub number_of_images: u32,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: AspectRatio,
    pub project_id: Option<String>,
    pub request_id: Option<String>,
}

pub async fn text_to_image(
    State(state): State<AppState>,
    Extension(Principal(owner)): Extension<Principal>,
    Json(body): Json<TextToImageBody>,
) -> HostResult<Envelope<Value>> {
    let outcome = state
        .orchestrator
        .submit_text_to_image(TextToImageRequest {
            owner,
            prompt: body.prompt,
            number_of_images: body.number_of_images,
            aspect_ratio: body.aspect_ratio,
            project_id: body.project_id,
            request_id: body.request_id,
        })
        .await?;
    Ok(Envelope::accepted(outcome_json(&outcome)))
}

pub async fn image_reference(
    State(state): State<AppState>,
    Extension(Principal(owner)): Extension<Principal>,
    mut multipart: Multipart,
) -> HostResult<Envelope<Value>> {
    let mut prompt = None;
    let mut number_of_images = default_number_of_images();
    let mut aspect_ratio = default_aspect_ratio();
    let mut reference_kind = ReferenceKind::Subject;
    let mut project_id = None;
    let mut request_id = None;
    let mut reference = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HostError::Multipart(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "image" => {
                let received = save_field(field, &state.scratch_root).await?;
                reference = Some(UploadInput::Fresh {
                    local_path: received.local_path,
                    mime_type: received.mime_type,
                });
            }
            "prompt" => prompt = Some(text_value(field).await?),
            "numberOfImages" => number_of_images = parse_number_of_images(&text_value(field).await?)?,
            "aspectRatio" => aspect_ratio = parse_field("aspectRatio", &text_value(field).await?)?,
            "referenceKind" => reference_kind = parse_field("referenceKind", &text_value(field).await?)?,
            "projectId" => project_id = Some(text_value(field).await?),
            "requestId" => request_id = Some(text_value(field).await?),
            _ => {}
        }
    }

    let prompt = prompt.ok_or_else(|| HostError::Multipart("missing 'prompt' field".to_string()))?;
    let reference = reference.ok_or_else(|| HostError::Multipart("missing 'image' field".to_string()))?;

    let outcome = state
        .orchestrator
        .submit_image_reference(ImageReferenceRequest {
            owner,
            prompt,
            number_of_images,
            aspect_ratio,
            reference_kind,
            reference,
            project_id,
            request_id,
        })
        .await?;
    Ok(Envelope::accepted(outcome_json(&outcome)))
}

pub async fn image_multiple_reference(
    State(state): State<AppState>,
    Extension(Principal(owner)): Extension<Principal>,
    mut multipart: Multipart,
) -> HostResult<Envelope<Value>> {
    let mut prompt = None;
    let mut number_of_images = default_number_of_images();
    let mut aspect_ratio = default_aspect_ratio();
    let mut project_id = None;
    let mut request_id = None;
    let mut target = None;
    let mut references = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HostError::Multipart(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "targetImage" => {
                let received = save_field(field, &state.scratch_root).await?;
                target = Some(UploadInput::Fresh {
                    local_path: received.local_path,
                    mime_type: received.mime_type,
                });
            }
            "referenceImages" => {
                let received = save_field(field, &state.scratch_root).await?;
                references.push(UploadInput::Fresh {
                    local_path: received.local_path,
                    mime_type: received.mime_type,
                });
            }
            "prompt" => prompt = Some(text_value(field).await?),
            "numberOfImages" => number_of_images = parse_number_of_images(&text_value(field).await?)?,
            "aspectRatio" => aspect_ratio = parse_field("aspectRatio", &text_value(field).await?)?,
            "projectId" => project_id = Some(text_value(field).await?),
            "requestId" => request_id = Some(text_value(field).await?),
            _ => {}
        }
    }

    let prompt = prompt.ok_or_else(|| HostError::Multipart("missing 'prompt' field".to_string()))?;
    let target = target.ok_or_else(|| HostError::Multipart("missing 'targetImage' field".to_string()))?;

    let outcome = state
        .orchestrator
        .submit_image_multiple_reference(ImageMultiReferenceRequest {
            owner,
            prompt,
            number_of_images,
            aspect_ratio,
            target,
            references,
            project_id,
            request_id,
        })
        .await?;
    Ok(Envelope::accepted(outcome_json(&outcome)))
}

pub async fn get_generation(
    State(state): State<AppState>,
    Extension(Principal(owner)): Extension<Principal>,
    Path(generation_id): Path<GenerationId>,
) -> HostResult<Envelope<imagegen_core::GenerationRecord>> {
    let record = state.orchestrator.get_generation(owner, generation_id).await?;
    Ok(Envelope::ok(record))
}

#[derive(Debug, Deserialize)]
pub struct ListGenerationsQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub include_failed: bool,
}

pub async fn list_my_generations(
    State(state): State<AppState>,
    Extension(Principal(owner)): Extension<Principal>,
    Query(query): Query<ListGenerationsQuery>,
) -> HostResult<Envelope<Value>> {
    let cursor = query
        .cursor
        .as_deref()
        .map(decode_generation_cursor)
        .transpose()?;
    let page = state
        .orchestrator
        .list_my_generations(
            owner,
            query.limit.unwrap_or(20),
            imagegen_orchestrator::ListFilter {
                cursor,
                include_failed: query.include_failed,
            },
        )
        .await?;
    Ok(Envelope::ok(json!({
        "items": page.items,
        "nextCursor": page.next_cursor.map(|(ts, id)| encode_generation_cursor(ts, id)),
        "hasMore": page.has_more,
    })))
}

fn outcome_json(outcome: &imagegen_orchestrator::SubmitOutcome) -> Value {
    json!({
        "generationId": outcome.generation_id,
        "jobId": outcome.job_id,
        "events": outcome.events,
    })
}

async fn text_value(field: axum::extract::multipart::Field<'_>) -> HostResult<String> {
    field
        .text()
        .await
        .map_err(|e| HostError::Multipart(e.to_string()))
}

/// Parses a multipart text field the same way `serde` would parse the
/// equivalent JSON body field — an unrecognized value is a 400, not a
/// silent fallback to the default (§7).
fn parse_field<T: for<'de> Deserialize<'de>>(field_name: &str, raw: &str) -> HostResult<T> {
    serde_json::from_str(&format!("\"{raw}\""))
        .map_err(|_| HostError::Multipart(format!("invalid value for '{field_name}': {raw}")))
}

fn parse_number_of_images(raw: &str) -> HostResult<u32> {
    raw.parse()
        .map_err(|_| HostError::Multipart(format!("invalid 'numberOfImages': {raw}")))
}

fn encode_generation_cursor(ts: chrono::DateTime<chrono::Utc>, id: uuid::Uuid) -> String {
    format!("{}_{id}", ts.timestamp_micros())
}

fn decode_generation_cursor(raw: &str) -> HostResult<(chrono::DateTime<chrono::Utc>, uuid::Uuid)> {
    let (ts_part, id_part) = raw
        .split_once('_')
        .ok_or_else(|| HostError::Core(imagegen_core::CoreError::Validation("malformed cursor".to_string())))?;
    let micros: i64 = ts_part
        .parse()
        .map_err(|_| HostError::Core(imagegen_core::CoreError::Validation("malformed cursor".to_string())))?;
    let ts = chrono::DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| HostError::Core(imagegen_core::CoreError::Validation("malformed cursor".to_string())))?;
    let id = uuid::Uuid::from_str(id_part)
        .map_err(|_| HostError::Core(imagegen_core::CoreError::Validation("malformed cursor".to_string())))?;
    Ok((ts, id))
}
