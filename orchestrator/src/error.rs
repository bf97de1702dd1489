use imagegen_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Ledger(#[from] imagegen_ledger::LedgerError),

    #[error(transparent)]
    BlobStore(#[from] imagegen_blobstore::BlobStoreError),

    #[error(transparent)]
    TempStore(#[from] imagegen_tempstore::TempStoreError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<OrchestratorError> for CoreError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Core(e) => e,
            OrchestratorError::Ledger(e) => e.into(),
            OrchestratorError::BlobStore(e) => CoreError::Internal(anyhow::anyhow!(e)),
            OrchestratorError::TempStore(e) => CoreError::Internal(anyhow::anyhow!(e)),
            OrchestratorError::Database(e) => CoreError::Internal(anyhow::anyhow!(e)),
            OrchestratorError::Serde(e) => CoreError::Internal(anyhow::anyhow!(e)),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
