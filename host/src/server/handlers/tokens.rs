//! `/tokens/*` handlers (§6): the caller's current balance and a
//! cursor-paginated transaction history.

use axum::extract::{Query, State};
use axum::Extension;
use imagegen_core::{ReasonCode, TransactionKind};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::auth::Principal;
use crate::envelope::Envelope;
use crate::error::{HostError, HostResult};
use crate::state::AppState;

pub async fn balance(
    State(state): State<AppState>,
    Extension(Principal(owner)): Extension<Principal>,
) -> HostResult<Envelope<Value>> {
    let balance = state.ledger.get_balance(owner).await.map_err(imagegen_core::CoreError::from)?;
    Ok(Envelope::ok(json!({
        "balance": balance.balance,
        "totalEarned": balance.total_earned,
        "totalSpent": balance.total_spent,
    })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub reason: Option<String>,
}

pub async fn history(
    State(state): State<AppState>,
    Extension(Principal(owner)): Extension<Principal>,
    Query(query): Query<HistoryQuery>,
) -> HostResult<Envelope<Value>> {
    let cursor = query
        .cursor
        .as_deref()
        .map(|raw| {
            raw.parse::<i64>()
                .ok()
                .and_then(chrono::DateTime::from_timestamp_micros)
                .ok_or_else(|| HostError::Core(imagegen_core::CoreError::Validation("malformed cursor".to_string())))
        })
        .transpose()?;

    let kind = query
        .kind
        .as_deref()
        .map(parse_transaction_kind)
        .transpose()?;
    let reason_code = query
        .reason
        .as_deref()
        .map(|raw| ReasonCode::from_str(raw).map_err(|_| HostError::Core(imagegen_core::CoreError::Validation(format!("unknown reason code '{raw}'")))))
        .transpose()?;

    let page = state
        .ledger
        .get_history(
            owner,
            query.limit.unwrap_or(20),
            imagegen_ledger::HistoryFilter { cursor, kind, reason_code },
        )
        .await
        .map_err(imagegen_core::CoreError::from)?;

    Ok(Envelope::ok(json!({
        "items": page.items,
        "nextCursor": page.next_cursor.map(|ts| ts.timestamp_micros().to_string()),
        "hasMore": page.has_more,
    })))
}

fn parse_transaction_kind(raw: &str) -> HostResult<TransactionKind> {
    match raw {
        "credit" => Ok(TransactionKind::Credit),
        "debit" => Ok(TransactionKind::Debit),
        other => Err(HostError::Core(imagegen_core::CoreError::Validation(format!(
            "unknown transaction type '{other}'"
        )))),
    }
}
