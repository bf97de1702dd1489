//! Ledger domain types: the token account, its append-only transaction log,
//! and the closed set of reasons a transaction may exist for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A user's token balance plus its lifetime credit/spend totals.
///
/// Created lazily on first credit; never destroyed. The Ledger is the only
/// component permitted to mutate this row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub owner: UserId,
    /// Invariant: never observed negative.
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
}

impl TokenAccount {
    pub fn zero(owner: UserId) -> Self {
        Self {
            owner,
            balance: 0,
            total_earned: 0,
            total_spent: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// The closed enumeration of reasons a `TokenTransaction` may exist.
///
/// §9's Open Questions freeze this to the subset enumerated in §3 of the
/// spec; extending it requires a deliberate migration, not a new string
/// showing up on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    SignupBonus,
    AdminTopup,
    TextToImage,
    ImageReference,
    ImageMultipleReference,
    Refund,
    Adjustment,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::SignupBonus => "signup_bonus",
            ReasonCode::AdminTopup => "admin_topup",
            ReasonCode::TextToImage => "text_to_image",
            ReasonCode::ImageReference => "image_reference",
            ReasonCode::ImageMultipleReference => "image_multiple_reference",
            ReasonCode::Refund => "refund",
            ReasonCode::Adjustment => "adjustment",
        }
    }
}

impl std::str::FromStr for ReasonCode {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup_bonus" => Ok(ReasonCode::SignupBonus),
            "admin_topup" => Ok(ReasonCode::AdminTopup),
            "text_to_image" => Ok(ReasonCode::TextToImage),
            "image_reference" => Ok(ReasonCode::ImageReference),
            "image_multiple_reference" => Ok(ReasonCode::ImageMultipleReference),
            "refund" => Ok(ReasonCode::Refund),
            "adjustment" => Ok(ReasonCode::Adjustment),
            other => Err(crate::error::CoreError::Validation(format!(
                "unknown reason code: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    System,
    User,
    Admin,
}

/// Who caused a ledger mutation, for audit purposes.
///
/// `request_id` additionally ties a `user`-actor transaction back to the
/// HTTP request-correlation id that caused it, so a support engineer can
/// join a ledger row back to an access-log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_type: ActorType,
    pub id: Option<UserId>,
    pub request_id: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            actor_type: ActorType::System,
            id: None,
            request_id: None,
        }
    }

    pub fn user(id: UserId, request_id: Option<String>) -> Self {
        Self {
            actor_type: ActorType::User,
            id: Some(id),
            request_id,
        }
    }
}

/// Optional cross-reference recorded alongside a transaction — e.g. the
/// `generationId` a charge was for. Purely informational: the ledger
/// never reads it back to make a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMetadata {
    pub reference_kind: String,
    pub reference_id: uuid::Uuid,
}

impl TransactionMetadata {
    pub fn generation(generation_id: uuid::Uuid) -> Self {
        Self {
            reference_kind: "generation".to_string(),
            reference_id: generation_id,
        }
    }
}

/// An append-only ledger entry. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransaction {
    pub id: uuid::Uuid,
    pub owner: UserId,
    pub kind: TransactionKind,
    /// Always positive; direction is carried by `kind`.
    pub amount: i64,
    pub balance_after: i64,
    pub reason_code: ReasonCode,
    pub reference_kind: Option<String>,
    pub reference_id: Option<uuid::Uuid>,
    pub idempotency_key: Option<String>,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn reason_code_roundtrips_through_str() {
        for rc in [
            ReasonCode::SignupBonus,
            ReasonCode::AdminTopup,
            ReasonCode::TextToImage,
            ReasonCode::ImageReference,
            ReasonCode::ImageMultipleReference,
            ReasonCode::Refund,
            ReasonCode::Adjustment,
        ] {
            assert_eq!(ReasonCode::from_str(rc.as_str()).unwrap(), rc);
        }
    }

    #[test]
    fn unknown_reason_code_is_rejected() {
        assert!(ReasonCode::from_str("not_a_real_code").is_err());
    }
}
