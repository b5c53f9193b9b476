//! HTTP client for read-only Consul queries
//!
//! Wraps a `reqwest::Client` configured from a [`ConnectionProfile`]: timeouts,
//! optional mutual TLS, and ACL token injection for KV paths.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use reqwest::{Certificate, Client, Identity};
use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};
use crate::profile::{ConnectionProfile, FailurePolicy};

static KV_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/v\d/kv/").expect("Invalid regex pattern"));

/// Whether `path` addresses the KV store (`/v<digit>/kv/...`)
pub fn is_kv_path(path: &str) -> bool {
    KV_PATH.is_match(path)
}

/// Raw answer to a GET, before any decoding
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can GET a Consul path.
///
/// Non-2xx statuses come back as `Ok`; only transport failures are errors.
#[async_trait]
pub trait ConsulTransport: Send + Sync {
    /// GET `path` (already including the key), optionally with `?recurse`
    async fn get(&self, path: &str, recurse: bool) -> Result<HttpResponse>;

    /// Failure policy the caller should apply to transport errors
    fn failure_policy(&self) -> FailurePolicy;
}

/// HTTP client bound to one Consul agent
pub struct ConsulHttpClient {
    client: Client,
    profile: ConnectionProfile,
    base_url: Url,
}

impl ConsulHttpClient {
    /// Create a new client, loading TLS material from disk when enabled
    pub fn new(profile: ConnectionProfile) -> Result<Self> {
        profile.validate()?;

        let mut builder = Client::builder()
            .connect_timeout(profile.connect_timeout)
            .timeout(profile.read_timeout);

        if let Some(tls) = &profile.tls {
            let mut pem = read_pem(&tls.cert)?;
            pem.extend_from_slice(b"\n");
            pem.extend_from_slice(&read_pem(&tls.key)?);
            let identity = Identity::from_pem(&pem).map_err(|e| {
                ClientError::Configuration(format!("invalid client certificate or key: {}", e))
            })?;
            builder = builder.identity(identity);

            if let Some(ca_cert) = &tls.ca_cert {
                let ca = Certificate::from_pem(&read_pem(ca_cert)?).map_err(|e| {
                    ClientError::Configuration(format!(
                        "invalid CA certificate {}: {}",
                        ca_cert.display(),
                        e
                    ))
                })?;
                builder = builder.add_root_certificate(ca);
            }

            if !tls.verify {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build client: {}", e)))?;
        let base_url = Url::parse(&profile.base_url()).map_err(|e| {
            ClientError::Configuration(format!("invalid agent address {}: {}", profile.base_url(), e))
        })?;

        Ok(Self {
            client,
            profile,
            base_url,
        })
    }

    /// Build the full URL for a path, without the token.
    ///
    /// Every `/`-separated segment is percent-encoded, so `#`, `?` and `%`
    /// in a key stay part of the key.
    fn build_url(&self, path: &str, recurse: bool) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Configuration(format!("cannot append a path to {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(path.trim_start_matches('/').split('/'));
        if recurse {
            url.set_query(Some("recurse"));
        }
        Ok(url)
    }
}

#[async_trait]
impl ConsulTransport for ConsulHttpClient {
    async fn get(&self, path: &str, recurse: bool) -> Result<HttpResponse> {
        let url = self.build_url(path, recurse)?;
        debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.profile.token {
            if is_kv_path(path) {
                request = request.query(&[("token", token.as_str())]);
            }
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(HttpResponse { status, body })
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.profile.failure
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        ClientError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })
}
