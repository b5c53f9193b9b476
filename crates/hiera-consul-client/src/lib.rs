//! Hiera Consul Client - read-only HTTP access to a Consul agent
//!
//! This crate provides:
//! - Connection profile (host, port, timeouts, TLS, ACL token, failure policy)
//! - HTTP client with mutual TLS and token injection for KV paths
//! - A transport trait so lookups can run against fakes in tests

pub mod error;
pub mod http;
pub mod profile;

pub use error::ClientError;
pub use http::{ConsulHttpClient, ConsulTransport, HttpResponse, is_kv_path};
pub use profile::{ConnectionProfile, FailurePolicy, TlsProfile};
