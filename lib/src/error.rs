//! The error taxonomy (§7): one variant per kind, surfaced to clients as the
//! `error` field of the HTTP envelope. Mirrors `HostError` in spirit:
//! a flat enum with `#[from]` conversions for the library errors each
//! component bubbles up, and a `CoreResult<T>` alias used throughout the
//! workspace.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed prompt length, unsupported aspect ratio/MIME, missing
    /// reference selector. Local to the Orchestrator; no side effects.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing or invalid bearer, at either the HTTP or socket handshake.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Generation id, reference id, or operation name not owned/known by
    /// the caller. Returned instead of a 403 to avoid confirming existence.
    #[error("not found: {0}")]
    NotFound(String),

    /// Balance check failed at enqueue, or the debit raced and lost at
    /// charge time.
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    /// Transient ModelClient/BlobStore failure; the broker retries this
    /// with exponential backoff up to the job's attempt budget.
    #[error("retryable: {0}")]
    Retryable(String),

    /// Non-retryable failure: a filtered prompt, invalid input, a
    /// referenced image that's gone, or a retry budget exhausted. Takes a
    /// generation straight to `failed`.
    #[error("permanent: {0}")]
    Permanent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("task join error: {0}")]
    JoinHandle(#[from] tokio::task::JoinError),

    /// Anything else. Logged with correlation ids; the client sees a
    /// generic message.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Short, user-safe kind string used as the `error` field and as the
    /// Worker's recorded `GenerationRecord.error` prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION",
            CoreError::Auth(_) => "AUTH",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            CoreError::Retryable(_) => "RETRYABLE",
            CoreError::Permanent(_) => "PERMANENT",
            CoreError::Io(_) | CoreError::Serde(_) | CoreError::JoinHandle(_) => "INTERNAL",
            CoreError::Internal(_) => "INTERNAL",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Retryable(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
