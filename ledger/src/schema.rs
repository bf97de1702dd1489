//! Schema bootstrap for the ledger's two tables.
//!
//! Mirrors the `CREATE TABLE IF NOT EXISTS` + explicit index style of the
//! reference Postgres ledger adapter: idempotency is enforced by a unique
//! index the database itself polices, not by an application-level check
//! that could race.

use sqlx::PgPool;

use crate::LedgerError;

pub async fn init_schema(pool: &PgPool) -> Result<(), LedgerError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS token_accounts (
            owner UUID PRIMARY KEY,
            balance BIGINT NOT NULL CHECK (balance >= 0),
            total_earned BIGINT NOT NULL DEFAULT 0,
            total_spent BIGINT NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS token_transactions (
            id UUID PRIMARY KEY,
            owner UUID NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('credit', 'debit')),
            amount BIGINT NOT NULL CHECK (amount > 0),
            balance_after BIGINT NOT NULL,
            reason_code TEXT NOT NULL,
            reference_kind TEXT,
            reference_id UUID,
            idempotency_key TEXT,
            actor_type TEXT NOT NULL,
            actor_id UUID,
            actor_request_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_token_transactions_owner_created
        ON token_transactions(owner, created_at DESC, id DESC)
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Idempotency is scoped per-owner (§4.A: "across owners keys are
    // independent"); this partial unique index is the database-level
    // enforcement a racing replay cannot slip past.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_token_transactions_owner_idempotency
        ON token_transactions(owner, idempotency_key)
        WHERE idempotency_key IS NOT NULL
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
