//! Warm cache of service catalog data
//!
//! Built once from a full catalog walk and read-only afterwards. Every node
//! property of every service is flattened under three key shapes:
//!
//! | Key                           | Value                                  |
//! |-------------------------------|----------------------------------------|
//! | `{service}_{property}`        | value from the first node listed       |
//! | `{service}_{property}_{node}` | value on that node (not for `Node`)    |
//! | `{service}_{property}_array`  | values from every node, in list order  |
//!
//! A node named `array` has no per-node entries of its own: the array key
//! takes that name.
//!
//! `ServiceID` is never cached.

use std::collections::HashMap;

use hiera_consul_client::ConsulTransport;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::query::{QueryOptions, query};

const SKIPPED_PROPERTY: &str = "ServiceID";
const NODE_PROPERTY: &str = "Node";

/// Immutable snapshot of the service catalog
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceCache {
    entries: HashMap<String, Value>,
}

impl ServiceCache {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by key
    pub fn to_sorted_map(&self) -> Map<String, Value> {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| (k.clone(), self.entries[k].clone()))
            .collect()
    }
}

/// Accumulates catalog nodes before freezing them into a [`ServiceCache`]
#[derive(Debug, Default)]
pub struct ServiceCacheBuilder {
    entries: HashMap<String, Value>,
    arrays: HashMap<String, Vec<Value>>,
}

impl ServiceCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one node entry of `service`.
    pub fn add_node(&mut self, service: &str, node: &Map<String, Value>) {
        let node_name = node.get(NODE_PROPERTY).and_then(Value::as_str);

        for (property, value) in node {
            if property == SKIPPED_PROPERTY {
                continue;
            }

            if property != NODE_PROPERTY {
                if let Some(node_name) = node_name {
                    self.entries.insert(
                        format!("{}_{}_{}", service, property, node_name),
                        value.clone(),
                    );
                }
            }

            self.entries
                .entry(format!("{}_{}", service, property))
                .or_insert_with(|| value.clone());

            self.arrays
                .entry(format!("{}_{}_array", service, property))
                .or_default()
                .push(value.clone());
        }
    }

    /// Freeze the cache. An `_array` key shadows a per-node key of the same
    /// name (a node called `array`).
    pub fn build(self) -> ServiceCache {
        let mut entries = self.entries;
        for (key, values) in self.arrays {
            if let Some(shadowed) = entries.insert(key.clone(), Value::Array(values)) {
                warn!(
                    "Service cache key {} is both a node entry ({}) and an array, keeping the array",
                    key, shadowed
                );
            }
        }
        ServiceCache { entries }
    }
}

/// Walk the whole catalog and build the cache.
///
/// A listing that is not a mapping yields an empty cache and a service whose
/// node list is not a sequence is skipped. Transport failures follow the
/// transport's failure policy.
pub async fn build_service_cache(
    transport: &dyn ConsulTransport,
    services_path: &str,
    service_path: &str,
) -> Result<ServiceCache> {
    let mut builder = ServiceCacheBuilder::new();

    let services = match fetch_json(transport, services_path).await? {
        Some(Value::Object(services)) => services,
        _ => {
            warn!(
                "Service listing at {} is not a mapping, service cache left empty",
                services_path
            );
            return Ok(builder.build());
        }
    };

    for service in services.keys() {
        let path = format!("{}/{}", service_path.trim_end_matches('/'), service);
        let nodes = match fetch_json(transport, &path).await? {
            Some(Value::Array(nodes)) => nodes,
            _ => {
                warn!("Node list for service {} is not a sequence, skipping", service);
                continue;
            }
        };

        debug!("Caching {} nodes of service {}", nodes.len(), service);
        for node in &nodes {
            if let Value::Object(node) = node {
                builder.add_node(service, node);
            }
        }
    }

    let cache = builder.build();
    info!(
        "Service cache built: {} services, {} entries",
        services.len(),
        cache.len()
    );
    Ok(cache)
}

async fn fetch_json(transport: &dyn ConsulTransport, path: &str) -> Result<Option<Value>> {
    let Some(body) = query(transport, path, QueryOptions::default()).await? else {
        return Ok(None);
    };

    match serde_json::from_slice(&body) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Invalid JSON from {}: {}", path, e);
            Ok(None)
        }
    }
}
