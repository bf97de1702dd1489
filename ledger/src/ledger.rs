//! `Ledger`: credit/debit/getBalance/getHistory over a PostgreSQL-backed
//! token account, per §4.A.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use imagegen_core::{
    Actor, ActorType, ReasonCode, TokenTransaction, TransactionKind, TransactionMetadata, UserId,
};
use imagegen_core::MAX_TRANSACTION_AMOUNT;

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOpResult {
    pub balance: i64,
    pub transaction_id: Uuid,
    pub idempotent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub cursor: Option<DateTime<Utc>>,
    pub kind: Option<TransactionKind>,
    pub reason_code: Option<ReasonCode>,
}

#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub items: Vec<TokenTransaction>,
    pub next_cursor: Option<DateTime<Utc>>,
    pub has_more: bool,
}

pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct Ledger {
    pool: PgPool,
}

impl Ledger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> LedgerResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        crate::schema::init_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn credit(
        &self,
        owner: UserId,
        amount: i64,
        reason_code: ReasonCode,
        idempotency_key: Option<&str>,
        actor: Actor,
    ) -> LedgerResult<LedgerOpResult> {
        self.credit_with_metadata(owner, amount, reason_code, idempotency_key, actor, None)
            .await
    }

    pub async fn credit_with_metadata(
        &self,
        owner: UserId,
        amount: i64,
        reason_code: ReasonCode,
        idempotency_key: Option<&str>,
        actor: Actor,
        metadata: Option<TransactionMetadata>,
    ) -> LedgerResult<LedgerOpResult> {
        self.apply(owner, amount, TransactionKind::Credit, reason_code, idempotency_key, actor, metadata)
            .await
    }

    pub async fn debit(
        &self,
        owner: UserId,
        amount: i64,
        reason_code: ReasonCode,
        idempotency_key: Option<&str>,
        actor: Actor,
    ) -> LedgerResult<LedgerOpResult> {
        self.debit_with_metadata(owner, amount, reason_code, idempotency_key, actor, None)
            .await
    }

    pub async fn debit_with_metadata(
        &self,
        owner: UserId,
        amount: i64,
        reason_code: ReasonCode,
        idempotency_key: Option<&str>,
        actor: Actor,
        metadata: Option<TransactionMetadata>,
    ) -> LedgerResult<LedgerOpResult> {
        self.apply(owner, amount, TransactionKind::Debit, reason_code, idempotency_key, actor, metadata)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        owner: UserId,
        amount: i64,
        kind: TransactionKind,
        reason_code: ReasonCode,
        idempotency_key: Option<&str>,
        actor: Actor,
        metadata: Option<TransactionMetadata>,
    ) -> LedgerResult<LedgerOpResult> {
        if amount <= 0 || amount > MAX_TRANSACTION_AMOUNT {
            return Err(LedgerError::AmountOutOfRange(amount, MAX_TRANSACTION_AMOUNT));
        }

        let mut tx = self.pool.begin().await?;

        // Idempotency check happens before the row lock: a replay of a
        // previously-successful call must not block on, or reacquire, the
        // account lock at all.
        if let Some(key) = idempotency_key {
            if let Some(row) = sqlx::query(
                r#"
                SELECT id, balance_after FROM token_transactions
                WHERE owner = $1 AND idempotency_key = $2
                "#,
            )
            .bind(owner.into_inner())
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?
            {
                let transaction_id: Uuid = row.try_get("id")?;
                let balance_after: i64 = row.try_get("balance_after")?;
                tx.commit().await?;
                return Ok(LedgerOpResult {
                    balance: balance_after,
                    transaction_id,
                    idempotent: true,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO token_accounts (owner, balance, total_earned, total_spent)
            VALUES ($1, 0, 0, 0)
            ON CONFLICT (owner) DO NOTHING
            "#,
        )
        .bind(owner.into_inner())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT balance, total_earned, total_spent FROM token_accounts
            WHERE owner = $1
            FOR UPDATE
            "#,
        )
        .bind(owner.into_inner())
        .fetch_one(&mut *tx)
        .await?;

        let balance: i64 = row.try_get("balance")?;
        let total_earned: i64 = row.try_get("total_earned")?;
        let total_spent: i64 = row.try_get("total_spent")?;

        let (new_balance, new_earned, new_spent) = match kind {
            TransactionKind::Credit => (balance + amount, total_earned + amount, total_spent),
            TransactionKind::Debit => {
                if balance < amount {
                    // No state changes; the transaction rolls back on drop.
                    return Err(LedgerError::InsufficientFunds {
                        balance,
                        required: amount,
                    });
                }
                (balance - amount, total_earned, total_spent + amount)
            }
        };

        sqlx::query(
            r#"
            UPDATE token_accounts
            SET balance = $2, total_earned = $3, total_spent = $4
            WHERE owner = $1
            "#,
        )
        .bind(owner.into_inner())
        .bind(new_balance)
        .bind(new_earned)
        .bind(new_spent)
        .execute(&mut *tx)
        .await?;

        let transaction_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO token_transactions
                (id, owner, kind, amount, balance_after, reason_code,
                 reference_kind, reference_id,
                 idempotency_key, actor_type, actor_id, actor_request_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(transaction_id)
        .bind(owner.into_inner())
        .bind(match kind {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        })
        .bind(amount)
        .bind(new_balance)
        .bind(reason_code.as_str())
        .bind(metadata.as_ref().map(|m| m.reference_kind.clone()))
        .bind(metadata.as_ref().map(|m| m.reference_id))
        .bind(idempotency_key)
        .bind(match actor.actor_type {
            ActorType::System => "system",
            ActorType::User => "user",
            ActorType::Admin => "admin",
        })
        .bind(actor.id.map(|id| id.into_inner()))
        .bind(actor.request_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LedgerOpResult {
            balance: new_balance,
            transaction_id,
            idempotent: false,
        })
    }

    pub async fn get_balance(&self, owner: UserId) -> LedgerResult<Balance> {
        let row = sqlx::query(
            r#"
            SELECT balance, total_earned, total_spent FROM token_accounts
            WHERE owner = $1
            "#,
        )
        .bind(owner.into_inner())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Balance {
                balance: row.try_get("balance")?,
                total_earned: row.try_get("total_earned")?,
                total_spent: row.try_get("total_spent")?,
            },
            None => Balance {
                balance: 0,
                total_earned: 0,
                total_spent: 0,
            },
        })
    }

    pub async fn get_history(
        &self,
        owner: UserId,
        limit: u32,
        filter: HistoryFilter,
    ) -> LedgerResult<HistoryPage> {
        let limit = limit.min(MAX_HISTORY_LIMIT).max(1);

        // Fetch one extra row to learn `has_more` without a second query.
        let rows = sqlx::query(
            r#"
            SELECT id, owner, kind, amount, balance_after, reason_code,
                   reference_kind, reference_id, idempotency_key,
                   actor_type, actor_id, actor_request_id, created_at
            FROM token_transactions
            WHERE owner = $1
              AND ($2::timestamptz IS NULL OR created_at < $2)
              AND ($3::text IS NULL OR kind = $3)
              AND ($4::text IS NULL OR reason_code = $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(owner.into_inner())
        .bind(filter.cursor)
        .bind(filter.kind.map(|k| match k {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }))
        .bind(filter.reason_code.map(|r| r.as_str()))
        .bind(limit as i64 + 1)
        .fetch_all(&self.pool)
        .await?;

        let has_more = rows.len() as u32 > limit;
        let mut items = Vec::with_capacity(rows.len().min(limit as usize));
        for row in rows.into_iter().take(limit as usize) {
            let kind_str: String = row.try_get("kind")?;
            let reason_str: String = row.try_get("reason_code")?;
            let actor_type_str: String = row.try_get("actor_type")?;

            items.push(TokenTransaction {
                id: row.try_get("id")?,
                owner,
                kind: if kind_str == "credit" {
                    TransactionKind::Credit
                } else {
                    TransactionKind::Debit
                },
                amount: row.try_get("amount")?,
                balance_after: row.try_get("balance_after")?,
                reason_code: ReasonCode::from_str(&reason_str)
                    .map_err(|e: imagegen_core::CoreError| LedgerError::Core(e))?,
                reference_kind: row.try_get("reference_kind")?,
                reference_id: row.try_get("reference_id")?,
                idempotency_key: row.try_get("idempotency_key")?,
                actor: Actor {
                    actor_type: match actor_type_str.as_str() {
                        "system" => ActorType::System,
                        "user" => ActorType::User,
                        _ => ActorType::Admin,
                    },
                    id: row
                        .try_get::<Option<Uuid>, _>("actor_id")?
                        .map(UserId::from),
                    request_id: row.try_get("actor_request_id")?,
                },
                created_at: row.try_get("created_at")?,
            });
        }

        let next_cursor = if has_more {
            items.last().map(|t| t.created_at)
        } else {
            None
        };

        Ok(HistoryPage {
            items,
            next_cursor,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_negative_amounts_before_any_lock() {
        assert!(MAX_TRANSACTION_AMOUNT > 0);
    }
}
