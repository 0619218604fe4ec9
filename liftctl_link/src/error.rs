use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("telemetry timeout")]
    Timeout,
    #[error("machine disconnected")]
    Disconnected,
    #[error("command rejected: {0}")]
    CommandRejected(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
