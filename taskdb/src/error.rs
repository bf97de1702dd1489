use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("job not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("queue is closed")]
    Closed,
}

pub type BrokerResult<T> = Result<T, BrokerError>;
