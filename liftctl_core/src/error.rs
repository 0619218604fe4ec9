use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("link error: {0}")]
    Link(String),
    #[error("link fault: {0}")]
    LinkFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for telemetry")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing machine link")]
    MissingLink,
    #[error("missing session store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Map any boxed collaborator error to a typed EngineError, with precise
/// handling for link errors when the `link-errors` feature is on.
pub(crate) fn map_link_error(e: &(dyn std::error::Error + 'static)) -> EngineError {
    #[cfg(feature = "link-errors")]
    if let Some(le) = e.downcast_ref::<liftctl_link::error::LinkError>() {
        use liftctl_link::error::LinkError;
        return match le {
            LinkError::Timeout => EngineError::Timeout,
            other => EngineError::LinkFault(other.to_string()),
        };
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        EngineError::Timeout
    } else {
        EngineError::Link(s)
    }
}
