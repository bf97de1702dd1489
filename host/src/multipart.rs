//! Scratch-file handling for multipart reference uploads (§6's multipart
//! rules): each accepted field is validated by MIME/size and written to
//! `scratch_root` under a fresh UUID, ready to hand to the Orchestrator as
//! an `UploadInput::Fresh`.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;

use crate::error::{HostError, HostResult};

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
];

pub struct ReceivedImage {
    pub local_path: PathBuf,
    pub mime_type: String,
}

pub async fn save_field(field: Field<'_>, scratch_root: &Path) -> HostResult<ReceivedImage> {
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(HostError::Multipart(format!(
            "unsupported content type: {mime_type}"
        )));
    }

    let bytes = field
        .bytes()
        .await
        .map_err(|e| HostError::Multipart(e.to_string()))?;
    if bytes.len() as u64 > MAX_IMAGE_BYTES {
        return Err(HostError::PayloadTooLarge);
    }

    tokio::fs::create_dir_all(scratch_root).await?;
    let path = scratch_root.join(format!("{}.{}", uuid::Uuid::new_v4(), ext_for_mime(&mime_type)));
    tokio::fs::write(&path, &bytes).await?;

    Ok(ReceivedImage {
        local_path: path,
        mime_type,
    })
}

fn ext_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_allowed_mime_type_maps_to_a_distinct_extension_or_jpg() {
        for mime in ALLOWED_MIME_TYPES {
            assert!(!ext_for_mime(mime).is_empty());
        }
    }

    #[test]
    fn unknown_mime_types_fall_back_to_jpg() {
        assert_eq!(ext_for_mime("application/octet-stream"), "jpg");
    }
}
