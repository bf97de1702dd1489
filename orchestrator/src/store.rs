//! `GenerationStore`: the Postgres-backed home of `GenerationRecord`
//! (§3). Shared by the Orchestrator (create, read) and the Worker
//! (the sole writer of every field after creation).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use imagegen_core::{
    GenerationId, GenerationRecord, GenerationStatus, OperationId, RequestMetadata, Timings,
    UploadId, UserId,
};

use crate::error::OrchestratorResult;

pub struct GenerationStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub cursor: Option<(DateTime<Utc>, Uuid)>,
    pub include_failed: bool,
}

#[derive(Debug, Clone)]
pub struct GenerationPage {
    pub items: Vec<GenerationRecord>,
    pub next_cursor: Option<(DateTime<Utc>, Uuid)>,
    pub has_more: bool,
}

pub const MAX_LIST_LIMIT: u32 = 100;

impl GenerationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS generations (
                id UUID PRIMARY KEY,
                owner UUID NOT NULL,
                operation_id UUID NOT NULL,
                operation_name TEXT NOT NULL,
                prompt TEXT NOT NULL,
                request_metadata JSONB NOT NULL,
                status TEXT NOT NULL,
                progress SMALLINT NOT NULL DEFAULT 0,
                tokens_charged BIGINT NOT NULL DEFAULT 0,
                outputs JSONB NOT NULL DEFAULT '[]',
                error TEXT,
                timings JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_generations_owner_created
            ON generations(owner, created_at DESC, id DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert(&self, record: &GenerationRecord) -> OrchestratorResult<()> {
        let created_at = record.timings.created_at.unwrap_or_else(Utc::now);
        sqlx::query(
            r#"
            INSERT INTO generations
                (id, owner, operation_id, operation_name, prompt, request_metadata,
                 status, progress, tokens_charged, outputs, error, timings, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id.into_inner())
        .bind(record.owner.into_inner())
        .bind(record.operation.into_inner())
        .bind(&record.operation_name)
        .bind(&record.prompt)
        .bind(serde_json::to_value(&record.request_metadata)?)
        .bind(status_str(record.status))
        .bind(record.progress as i16)
        .bind(record.tokens_charged)
        .bind(serde_json::to_value(&record.outputs)?)
        .bind(&record.error)
        .bind(serde_json::to_value(&record.timings)?)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, owner: UserId, id: GenerationId) -> OrchestratorResult<Option<GenerationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, operation_id, operation_name, prompt, request_metadata,
                   status, progress, tokens_charged, outputs, error, timings
            FROM generations
            WHERE owner = $1 AND id = $2
            "#,
        )
        .bind(owner.into_inner())
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    pub async fn list(&self, owner: UserId, limit: u32, filter: ListFilter) -> OrchestratorResult<GenerationPage> {
        let limit = limit.min(MAX_LIST_LIMIT).max(1);
        let (cursor_ts, cursor_id) = filter
            .cursor
            .map(|(ts, id)| (Some(ts), Some(id)))
            .unwrap_or((None, None));

        let rows = sqlx::query(
            r#"
            SELECT id, owner, operation_id, operation_name, prompt, request_metadata,
                   status, progress, tokens_charged, outputs, error, timings, created_at
            FROM generations
            WHERE owner = $1
              AND ($4 OR status != 'failed')
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(owner.into_inner())
        .bind(cursor_ts)
        .bind(cursor_id)
        .bind(filter.include_failed)
        .bind(limit as i64 + 1)
        .fetch_all(&self.pool)
        .await?;

        let has_more = rows.len() as u32 > limit;
        let mut created_ats = Vec::with_capacity(rows.len().min(limit as usize));
        let mut items = Vec::with_capacity(rows.len().min(limit as usize));
        for row in rows.into_iter().take(limit as usize) {
            let created_at: DateTime<Utc> = row.try_get("created_at")?;
            created_ats.push((created_at, row.try_get::<Uuid, _>("id")?));
            items.push(row_to_record(row)?);
        }

        let next_cursor = if has_more { created_ats.last().copied() } else { None };

        Ok(GenerationPage {
            items,
            next_cursor,
            has_more,
        })
    }

    pub async fn mark_processing(&self, id: GenerationId, started_at: DateTime<Utc>) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            UPDATE generations
            SET status = 'processing', progress = 1,
                timings = jsonb_set(timings, '{started_at}', to_jsonb($2::timestamptz))
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .bind(started_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_progress(&self, id: GenerationId, progress: u8) -> OrchestratorResult<()> {
        sqlx::query("UPDATE generations SET progress = $2 WHERE id = $1")
            .bind(id.into_inner())
            .bind(progress as i16)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_completed(
        &self,
        id: GenerationId,
        outputs: &[UploadId],
        tokens_charged: i64,
        completed_at: DateTime<Utc>,
        processing_ms: i64,
    ) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            UPDATE generations
            SET status = 'completed', progress = 100, tokens_charged = $2,
                outputs = $3,
                timings = jsonb_set(jsonb_set(timings, '{completed_at}', to_jsonb($4::timestamptz)),
                                     '{processing_ms}', to_jsonb($5::bigint))
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .bind(tokens_charged)
        .bind(serde_json::to_value(outputs)?)
        .bind(completed_at)
        .bind(processing_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: GenerationId, error: &str, completed_at: DateTime<Utc>) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            UPDATE generations
            SET status = 'failed', error = $2,
                timings = jsonb_set(timings, '{completed_at}', to_jsonb($3::timestamptz))
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .bind(error)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn status_str(status: GenerationStatus) -> &'static str {
    match status {
        GenerationStatus::Pending => "pending",
        GenerationStatus::Processing => "processing",
        GenerationStatus::Completed => "completed",
        GenerationStatus::Failed => "failed",
    }
}

fn row_to_record(row: sqlx::postgres::PgRow) -> OrchestratorResult<GenerationRecord> {
    let status_raw: String = row.try_get("status")?;
    let status = match status_raw.as_str() {
        "pending" => GenerationStatus::Pending,
        "processing" => GenerationStatus::Processing,
        "completed" => GenerationStatus::Completed,
        _ => GenerationStatus::Failed,
    };

    let request_metadata: Value = row.try_get("request_metadata")?;
    let outputs: Value = row.try_get("outputs")?;
    let timings: Value = row.try_get("timings")?;

    Ok(GenerationRecord {
        id: GenerationId::from(row.try_get::<Uuid, _>("id")?),
        owner: UserId::from(row.try_get::<Uuid, _>("owner")?),
        operation: OperationId::from(row.try_get::<Uuid, _>("operation_id")?),
        operation_name: row.try_get("operation_name")?,
        prompt: row.try_get("prompt")?,
        request_metadata: serde_json::from_value::<RequestMetadata>(request_metadata)?,
        status,
        progress: row.try_get::<i16, _>("progress")? as u8,
        tokens_charged: row.try_get("tokens_charged")?,
        outputs: serde_json::from_value::<Vec<UploadId>>(outputs)?,
        error: row.try_get("error")?,
        timings: serde_json::from_value::<Timings>(timings)?,
    })
}
