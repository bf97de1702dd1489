use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote blob store error: {0}")]
    Remote(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BlobStoreResult<T> = Result<T, BlobStoreError>;
