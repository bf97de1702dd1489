//! Shared domain types and the error taxonomy for the image-generation core.
//!
//! Every other crate in the workspace (`imagegen-ledger`, `imagegen-broker`,
//! `imagegen-orchestrator`, `imagegen-worker`, `imagegen-host`, ...) depends
//! on this crate for the record shapes that cross component boundaries, so
//! that no two components invent their own copy of `GenerationStatus` or
//! `ReasonCode`.

pub mod error;
pub mod generation;
pub mod ids;
pub mod job;
pub mod ledger;
pub mod operation;
pub mod tempfile;
pub mod upload;

pub use error::{CoreError, CoreResult};
pub use generation::{
    AspectRatio, GenerationRecord, GenerationStatus, ReferenceKind, RequestMetadata, Timings,
};
pub use ids::{GenerationId, JobId, OperationId, TempFileId, UploadId, UserId};
pub use job::{Job, JobPriority, JobState};
pub use ledger::{
    Actor, ActorType, ReasonCode, TokenAccount, TokenTransaction, TransactionKind,
    TransactionMetadata,
};
pub use operation::OperationType;
pub use tempfile::{TempFile, TempFileMetadata};
pub use upload::{Upload, UploadPurpose};

/// Maximum number of output images a single generation request may request.
pub const MAX_OUTPUTS: u32 = 4;

/// Ceiling on a single ledger transaction, enforced by the Ledger before any lock is taken.
pub const MAX_TRANSACTION_AMOUNT: i64 = 1_000_000;

/// Default time-to-live for a `TempFile` registry entry.
pub const DEFAULT_TEMP_FILE_TTL_SECS: i64 = 5 * 60;

/// Default broker visibility timeout before a claimed job is declared stalled.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 60;

/// Retry budget the Orchestrator enqueues generation jobs with, and the
/// Worker consults to decide whether a retryable model/blob failure on
/// this attempt is the one the broker will finalize as terminal.
pub const GENERATION_JOB_MAX_ATTEMPTS: u32 = 3;
