//! Candidate path resolution
//!
//! Turns configured path templates into the ordered list of Consul paths to
//! query for one key. Paths Consul cannot answer are dropped, never reported.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::BackendConfig;

/// Candidate that routes a lookup to the warmed service cache
pub const SERVICES_SENTINEL: &str = "services";

/// Variables visible to path templates
pub type Scope = HashMap<String, String>;

static SUPPORTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/v\d/(catalog|kv)/").expect("Invalid regex pattern"));

/// Expand `%{name}` placeholders.
///
/// `%{key}` is the lookup key, any other name (optionally written `%{::name}`)
/// comes from `scope`. Unknown names expand to nothing.
pub fn interpolate(template: &str, key: &str, scope: &Scope) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated placeholder, keep it verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after[..end].trim().trim_start_matches("::");
        if name == "key" {
            out.push_str(key);
        } else if let Some(value) = scope.get(name) {
            out.push_str(value);
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Whether `path` may be queried for `key`
pub fn is_queryable(path: &str, key: &str) -> bool {
    if format!("{}/{}", path, key).contains("//") {
        debug!("The specified path {}/{} is malformed, skipping", path, key);
        return false;
    }
    if !SUPPORTED_PATH.is_match(path) {
        debug!(
            "Only catalog and kv queries are supported, skipping {}",
            path
        );
        return false;
    }
    true
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PathSource {
    /// Explicit templates from `paths`
    Templates(Vec<String>),
    /// `base` prefix joined with every hierarchy level
    Hierarchy { base: String, levels: Vec<String> },
}

/// Produces the ordered candidate paths for a lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathResolver {
    source: PathSource,
}

impl PathResolver {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            source: PathSource::Templates(paths),
        }
    }

    pub fn with_hierarchy(base: &str, levels: Vec<String>) -> Self {
        Self {
            source: PathSource::Hierarchy {
                base: base.trim_end_matches('/').to_string(),
                levels,
            },
        }
    }

    /// `paths` wins over `base` when both are configured
    pub fn from_config(config: &BackendConfig) -> Self {
        match (&config.base, config.paths.is_empty()) {
            (Some(base), true) => Self::with_hierarchy(base, config.hierarchy.clone()),
            _ => Self::new(config.paths.clone()),
        }
    }

    /// Every candidate in lookup order, before filtering
    pub fn candidates(&self, key: &str, scope: &Scope, order_override: Option<&str>) -> Vec<String> {
        let mut candidates: Vec<String> = order_override
            .map(|p| p.to_string())
            .into_iter()
            .collect();

        match &self.source {
            PathSource::Templates(templates) => {
                candidates.extend(templates.iter().map(|t| interpolate(t, key, scope)));
            }
            PathSource::Hierarchy { base, levels } => {
                candidates.extend(
                    levels
                        .iter()
                        .map(|level| interpolate(level, key, scope))
                        .filter(|level| !level.is_empty())
                        .map(|level| format!("{}/{}", base, level)),
                );
            }
        }

        candidates
    }

    /// Candidates that can actually be served, in lookup order.
    ///
    /// The services sentinel is kept so the caller can consult the cache.
    pub fn resolve(&self, key: &str, scope: &Scope, order_override: Option<&str>) -> Vec<String> {
        self.candidates(key, scope, order_override)
            .into_iter()
            .filter(|path| path == SERVICES_SENTINEL || is_queryable(path, key))
            .collect()
    }
}
