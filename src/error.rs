use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaiterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("backpressure: {0}")]
    Backpressure(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("mirror failure: {0}")]
    MirrorFailure(String),
    #[error("wait cancelled: {0}")]
    Cancelled(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, WaiterError>;

pub(crate) fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(WaiterError::InvalidArgument("id must not be empty".to_string()));
    }
    Ok(())
}
