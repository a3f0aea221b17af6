use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, SpoutError>;

#[derive(Debug, Error)]
pub enum SpoutError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("route not found: {0}")]
    RouteNotFound(String),
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("container runtime error: {0}")]
    Runtime(#[from] bollard::errors::Error),
    #[error("route store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}
