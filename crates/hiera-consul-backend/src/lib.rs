//! Hiera Consul Backend - resolve configuration keys against Consul
//!
//! This crate provides:
//! - Backend configuration loaded from file and environment
//! - Candidate path resolution with `%{...}` interpolation and filtering
//! - Decoding of KV and catalog answers per resolution type
//! - A service cache warmed from a full catalog walk
//! - The lookup orchestrator tying these together

pub mod backend;
pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod info;
pub mod path;
pub mod resolution;

mod query;
#[cfg(test)]
mod testing;

pub use backend::ConsulBackend;
pub use cache::{ServiceCache, ServiceCacheBuilder, build_service_cache};
pub use config::BackendConfig;
pub use error::{BackendError, DecodeError};
pub use info::consul_info;
pub use path::{PathResolver, SERVICES_SENTINEL, Scope};
pub use resolution::ResolutionType;
