//! Error types for the Consul lookup backend

use hiera_consul_client::ClientError;

/// Errors surfaced to the host.
///
/// Only configuration problems and strict-mode transport failures end up here;
/// bad paths, bad statuses and undecodable bodies degrade to "no answer".
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Client(ClientError),

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: ClientError,
    },
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Configuration(message) => BackendError::Configuration(message),
            other => BackendError::Client(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Why a Consul answer could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 value for {key}: {source}")]
    Base64 {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("value for {key} is not valid UTF-8")]
    Utf8 { key: String },

    #[error("unexpected value for {key}: {found}")]
    Shape { key: String, found: String },
}
