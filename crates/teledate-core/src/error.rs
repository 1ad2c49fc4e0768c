use thiserror::Error;

/// Top-level error type for Teledate.
#[derive(Debug, Error)]
pub enum TeledateError {
    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Store/database error.
    #[error("store error: {0}")]
    Store(String),

    /// Graph rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
