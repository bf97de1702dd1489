use thiserror::Error;

#[derive(Error, Debug)]
pub enum TempStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TempStoreResult<T> = Result<T, TempStoreError>;
