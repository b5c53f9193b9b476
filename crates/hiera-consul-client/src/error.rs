//! Client error types for the Consul HTTP adapter

/// Error type for Consul client construction and requests
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Whether the error happened on the wire rather than while building the client.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
