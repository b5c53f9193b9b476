//! Backend configuration
//!
//! Read from the `consul` section of a YAML/TOML file, with environment
//! overrides such as `HIERA_CONSUL__TOKEN` or `HIERA_CONSUL__PORT`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use hiera_consul_client::profile::DEFAULT_HTTP_TIMEOUT_SECS;
use hiera_consul_client::{ConnectionProfile, FailurePolicy, TlsProfile};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Section of the configuration file holding the backend settings
pub const CONFIG_SECTION: &str = "consul";

pub const DEFAULT_SERVICES_PATH: &str = "/v1/catalog/services";
pub const DEFAULT_SERVICE_PATH: &str = "/v1/catalog/service";

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_services_path() -> String {
    DEFAULT_SERVICES_PATH.to_string()
}

fn default_service_path() -> String {
    DEFAULT_SERVICE_PATH.to_string()
}

/// Settings consumed read-only by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub host: Option<String>,
    pub port: Option<u16>,

    #[serde(default)]
    pub use_ssl: bool,
    /// Set to false to skip peer verification
    #[serde(default = "default_true")]
    pub ssl_verify: bool,
    pub ssl_cert: Option<PathBuf>,
    pub ssl_key: Option<PathBuf>,
    pub ssl_ca_cert: Option<PathBuf>,

    /// Seconds
    #[serde(default = "default_timeout")]
    pub http_read_timeout: u64,
    /// Seconds
    #[serde(default = "default_timeout")]
    pub http_connect_timeout: u64,

    pub token: Option<String>,
    #[serde(default)]
    pub failure: FailurePolicy,

    /// Path templates, tried in order
    #[serde(default)]
    pub paths: Vec<String>,
    /// Single prefix combined with `hierarchy` when `paths` is empty
    pub base: Option<String>,
    #[serde(default)]
    pub hierarchy: Vec<String>,

    #[serde(default)]
    pub ignore_404: bool,
    /// Add `?recurse` to hash lookups
    #[serde(default)]
    pub recurse: bool,

    #[serde(default = "default_services_path")]
    pub services_path: String,
    #[serde(default = "default_service_path")]
    pub service_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            use_ssl: false,
            ssl_verify: true,
            ssl_cert: None,
            ssl_key: None,
            ssl_ca_cert: None,
            http_read_timeout: DEFAULT_HTTP_TIMEOUT_SECS,
            http_connect_timeout: DEFAULT_HTTP_TIMEOUT_SECS,
            token: None,
            failure: FailurePolicy::Strict,
            paths: Vec::new(),
            base: None,
            hierarchy: Vec::new(),
            ignore_404: false,
            recurse: false,
            services_path: default_services_path(),
            service_path: default_service_path(),
        }
    }
}

impl BackendConfig {
    /// Create a config for `host:port` querying the given path templates
    pub fn new(host: &str, port: u16, paths: Vec<String>) -> Self {
        Self {
            host: Some(host.to_string()),
            port: Some(port),
            paths,
            ..Default::default()
        }
    }

    /// Load the `consul` section from `path`, layered with `HIERA_CONSUL__*`
    /// environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("HIERA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: BackendConfig = settings.get(CONFIG_SECTION)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that would make the backend unusable.
    pub fn validate(&self) -> Result<()> {
        if self.host.as_deref().is_none_or(|h| h.trim().is_empty()) {
            return Err(BackendError::Configuration("host is required".to_string()));
        }
        if self.port.is_none_or(|p| p == 0) {
            return Err(BackendError::Configuration("port is required".to_string()));
        }
        if self.use_ssl && (self.ssl_cert.is_none() || self.ssl_key.is_none()) {
            return Err(BackendError::Configuration(
                "use_ssl requires ssl_cert and ssl_key".to_string(),
            ));
        }
        if self.paths.is_empty() && self.base.is_none() {
            return Err(BackendError::Configuration(
                "either paths or base must be configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the connection profile handed to the HTTP client.
    pub fn connection_profile(&self) -> Result<ConnectionProfile> {
        self.validate()?;

        let host = self.host.as_deref().unwrap_or_default();
        let port = self.port.unwrap_or_default();
        let mut profile = ConnectionProfile::new(host, port)
            .with_timeouts(
                Duration::from_secs(self.http_connect_timeout),
                Duration::from_secs(self.http_read_timeout),
            )
            .with_failure(self.failure);

        if let Some(token) = &self.token {
            profile = profile.with_token(token);
        }

        if self.use_ssl {
            if let (Some(cert), Some(key)) = (&self.ssl_cert, &self.ssl_key) {
                profile = profile.with_tls(TlsProfile {
                    verify: self.ssl_verify,
                    cert: cert.clone(),
                    key: key.clone(),
                    ca_cert: self.ssl_ca_cert.clone(),
                });
            }
        }

        Ok(profile)
    }
}
