//! Error classification for the pieces of the pipeline that don't already
//! speak `CoreError` (the generation/upload stores, the blob store, the
//! temp store): infra calls are assumed transient and wrapped as
//! `Retryable`, the same instinct `imagegen-modelclient`'s `http.rs` applies
//! to transport failures, so a DB blip or storage hiccup gets the broker's
//! backoff instead of failing the generation outright.

use imagegen_core::CoreError;

pub(crate) fn retryable<E: std::fmt::Display>(context: &str, err: E) -> CoreError {
    CoreError::Retryable(format!("{context}: {err}"))
}

pub(crate) fn permanent<E: std::fmt::Display>(context: &str, err: E) -> CoreError {
    CoreError::Permanent(format!("{context}: {err}"))
}
