//! Connection profile for a Consul agent
//!
//! A profile is built once per backend instance and never changes afterwards.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default read and connect timeout, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// What to do when a request fails at the transport level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailurePolicy {
    /// Abort the whole lookup
    #[default]
    Strict,
    /// Treat the failing path as "no answer" and move on
    Graceful,
}

impl From<&str> for FailurePolicy {
    fn from(value: &str) -> Self {
        // Anything but "graceful" keeps the strict default.
        if value.eq_ignore_ascii_case("graceful") {
            FailurePolicy::Graceful
        } else {
            FailurePolicy::Strict
        }
    }
}

impl From<String> for FailurePolicy {
    fn from(value: String) -> Self {
        FailurePolicy::from(value.as_str())
    }
}

impl From<FailurePolicy> for String {
    fn from(value: FailurePolicy) -> Self {
        match value {
            FailurePolicy::Strict => "strict".to_string(),
            FailurePolicy::Graceful => "graceful".to_string(),
        }
    }
}

/// Client certificate material used when TLS is enabled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsProfile {
    /// Verify the agent's certificate chain
    pub verify: bool,
    /// PEM encoded client certificate
    pub cert: PathBuf,
    /// PEM encoded private key for `cert`
    pub key: PathBuf,
    /// Optional PEM encoded CA bundle added to the trust store
    pub ca_cert: Option<PathBuf>,
}

/// Everything needed to talk to one Consul agent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// `Some` when requests go over HTTPS
    pub tls: Option<TlsProfile>,
    /// ACL token, only ever sent to KV paths
    pub token: Option<String>,
    pub failure: FailurePolicy,
}

impl ConnectionProfile {
    /// Create a plain HTTP profile with default timeouts
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            connect_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            tls: None,
            token: None,
            failure: FailurePolicy::Strict,
        }
    }

    /// Set timeouts
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Enable TLS
    pub fn with_tls(mut self, tls: TlsProfile) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set the ACL token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set the failure policy
    pub fn with_failure(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() { "https" } else { "http" }
    }

    /// Base URL without a trailing slash, e.g. `http://127.0.0.1:8500`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.port)
    }

    /// Reject profiles the client could never connect with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Configuration("host is required".to_string()));
        }
        if self.port == 0 {
            return Err(ClientError::Configuration("port is required".to_string()));
        }
        if let Some(tls) = &self.tls {
            if tls.cert.as_os_str().is_empty() || tls.key.as_os_str().is_empty() {
                return Err(ClientError::Configuration(
                    "TLS requires both a client certificate and key".to_string(),
                ));
            }
        }
        Ok(())
    }
}
