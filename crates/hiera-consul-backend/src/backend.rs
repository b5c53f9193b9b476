//! Lookup orchestration
//!
//! A lookup walks the resolved candidate paths in order and returns the first
//! non-empty answer. When the `services` sentinel is among the candidates the
//! warmed service cache is consulted before any HTTP request is made.

use std::sync::Arc;

use hiera_consul_client::{ConsulHttpClient, ConsulTransport};
use serde_json::Value;
use tracing::debug;

use crate::cache::{ServiceCache, build_service_cache};
use crate::config::BackendConfig;
use crate::decoder::{decode, is_answer};
use crate::error::Result;
use crate::path::{PathResolver, SERVICES_SENTINEL, Scope};
use crate::query::{QueryOptions, query};
use crate::resolution::ResolutionType;

/// Consul lookup backend
pub struct ConsulBackend {
    transport: Arc<dyn ConsulTransport>,
    resolver: PathResolver,
    cache: ServiceCache,
    ignore_404: bool,
    recurse: bool,
}

impl ConsulBackend {
    /// Connect to the configured agent and warm the service cache
    pub async fn new(config: &BackendConfig) -> Result<Self> {
        let client = ConsulHttpClient::new(config.connection_profile()?)?;
        Self::with_transport(config, Arc::new(client)).await
    }

    /// Like [`ConsulBackend::new`] over an arbitrary transport
    pub async fn with_transport(
        config: &BackendConfig,
        transport: Arc<dyn ConsulTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = build_service_cache(
            transport.as_ref(),
            &config.services_path,
            &config.service_path,
        )
        .await?;
        Self::with_cache(config, transport, cache)
    }

    /// Build a backend around an already warmed cache
    pub fn with_cache(
        config: &BackendConfig,
        transport: Arc<dyn ConsulTransport>,
        cache: ServiceCache,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            resolver: PathResolver::from_config(config),
            cache,
            ignore_404: config.ignore_404,
            recurse: config.recurse,
        })
    }

    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Resolve `key`.
    ///
    /// `Ok(None)` means no candidate had an answer and the host should try
    /// its next backend. Errors are strict-mode transport failures only.
    pub async fn lookup(
        &self,
        key: &str,
        scope: &Scope,
        order_override: Option<&str>,
        resolution: ResolutionType,
    ) -> Result<Option<Value>> {
        let paths = self.resolver.resolve(key, scope, order_override);

        if paths.iter().any(|p| p == SERVICES_SENTINEL) {
            if let Some(value) = self.cache.get(key) {
                debug!("Answered {} from the service cache", key);
                return Ok(Some(value.clone()));
            }
        }

        let options = QueryOptions {
            recurse: self.recurse && resolution == ResolutionType::Hash,
            ignore_404: self.ignore_404,
        };

        for path in paths.iter().filter(|p| *p != SERVICES_SENTINEL) {
            let full_path = format!("{}/{}", path, key);
            debug!("Lookup {} ({})", full_path, resolution);

            let Some(body) = query(self.transport.as_ref(), &full_path, options).await? else {
                continue;
            };
            debug!("Answer was {}", String::from_utf8_lossy(&body));

            if let Some(answer) = decode(&body, resolution).filter(is_answer) {
                return Ok(Some(answer));
            }
        }

        debug!("No answer for {}", key);
        Ok(None)
    }
}
