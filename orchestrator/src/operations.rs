//! `OperationCatalog`: the priced, live-read operation table (§3
//! supplement — the Orchestrator reads rows, not compiled-in constants,
//! so pricing can change without a redeploy). Seeded once at boot with
//! the three operations the system ships; admin CRUD over the table
//! beyond that seed is out of scope.

use imagegen_core::OperationType;
use sqlx::{PgPool, Row};

use crate::error::OrchestratorResult;

pub struct OperationCatalog {
    pool: PgPool,
}

impl OperationCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS operation_types (
                name TEXT PRIMARY KEY,
                tokens_per_operation INTEGER NOT NULL CHECK (tokens_per_operation > 0),
                active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        self.seed_default(OperationType::TEXT_TO_IMAGE, 10).await?;
        self.seed_default(OperationType::IMAGE_REFERENCE, 15).await?;
        self.seed_default(OperationType::IMAGE_MULTIPLE_REFERENCE, 25).await?;
        Ok(())
    }

    async fn seed_default(&self, name: &str, tokens_per_operation: i32) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO operation_types (name, tokens_per_operation, active)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(tokens_per_operation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Looks up `name`. Returns `None` for an unknown or inactive
    /// operation — callers turn that into a `Permanent` error (§4.G step 1).
    pub async fn get_active(&self, name: &str) -> OrchestratorResult<Option<OperationType>> {
        let row = sqlx::query(
            r#"
            SELECT name, tokens_per_operation, active FROM operation_types
            WHERE name = $1 AND active = TRUE
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| OperationType {
            name: row.get::<String, _>("name"),
            tokens_per_operation: row.get::<i32, _>("tokens_per_operation") as u32,
            active: row.get::<bool, _>("active"),
        }))
    }
}
