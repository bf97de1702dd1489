//! `UploadStore`: the persisted record behind every `BlobStore` key —
//! "a stable Upload record" the Orchestrator creates for any freshly
//! uploaded reference (§4.G step 4) and the Worker creates for every
//! generated output (§4.H step 5).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use imagegen_core::{Upload, UploadId, UploadPurpose, UserId};

use crate::error::OrchestratorResult;

pub struct UploadStore {
    pool: PgPool,
}

impl UploadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS uploads (
                id UUID PRIMARY KEY,
                owner UUID NOT NULL,
                purpose TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes BIGINT NOT NULL,
                storage_key TEXT NOT NULL,
                public_url TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_uploads_owner ON uploads(owner)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert(&self, upload: &Upload) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO uploads (id, owner, purpose, mime_type, size_bytes, storage_key, public_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(upload.id.into_inner())
        .bind(upload.owner.into_inner())
        .bind(purpose_str(upload.purpose))
        .bind(&upload.mime_type)
        .bind(upload.size_bytes as i64)
        .bind(&upload.storage_key)
        .bind(&upload.public_url)
        .bind(upload.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Owner-scoped lookup, used to verify a caller-supplied reference id
    /// actually belongs to them (§4.G step 4) before the Worker ever
    /// touches it.
    pub async fn get_owned(&self, owner: UserId, id: UploadId) -> OrchestratorResult<Option<Upload>> {
        let row = sqlx::query(
            r#"SELECT id, owner, purpose, mime_type, size_bytes, storage_key, public_url, created_at
               FROM uploads WHERE owner = $1 AND id = $2"#,
        )
        .bind(owner.into_inner())
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_upload).transpose()
    }

    /// Unscoped lookup for the Worker, which already trusts the id it was
    /// handed in the job payload.
    pub async fn get(&self, id: UploadId) -> OrchestratorResult<Option<Upload>> {
        let row = sqlx::query(
            r#"SELECT id, owner, purpose, mime_type, size_bytes, storage_key, public_url, created_at
               FROM uploads WHERE id = $1"#,
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_upload).transpose()
    }
}

fn purpose_str(purpose: UploadPurpose) -> &'static str {
    match purpose {
        UploadPurpose::ReferenceInput => "reference_input",
        UploadPurpose::GenerationOutput => "generation_output",
        UploadPurpose::Other => "other",
    }
}

fn row_to_upload(row: sqlx::postgres::PgRow) -> OrchestratorResult<Upload> {
    let purpose_raw: String = row.try_get("purpose")?;
    Ok(Upload {
        id: UploadId::from(row.try_get::<Uuid, _>("id")?),
        owner: UserId::from(row.try_get::<Uuid, _>("owner")?),
        purpose: match purpose_raw.as_str() {
            "reference_input" => UploadPurpose::ReferenceInput,
            "generation_output" => UploadPurpose::GenerationOutput,
            _ => UploadPurpose::Other,
        },
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
        storage_key: row.try_get("storage_key")?,
        public_url: row.try_get("public_url")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}
