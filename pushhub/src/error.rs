use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushHubError {
    #[error("socket send failed, receiver dropped")]
    SendFailed,
    #[error("unauthorized websocket handshake")]
    Unauthorized,
}

pub type PushHubResult<T> = Result<T, PushHubError>;
