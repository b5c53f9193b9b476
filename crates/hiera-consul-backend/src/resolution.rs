//! Resolution type requested by the host for one lookup

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shape the answer must take
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionType {
    /// First matching value only (Hiera's `priority`)
    #[default]
    #[serde(alias = "priority")]
    Scalar,
    Array,
    Hash,
}

impl ResolutionType {
    /// Value handed back when an answer cannot be decoded.
    ///
    /// Scalar lookups have no empty container and report absence instead.
    pub fn empty_container(self) -> Option<Value> {
        match self {
            ResolutionType::Scalar => None,
            ResolutionType::Array => Some(Value::Array(Vec::new())),
            ResolutionType::Hash => Some(Value::Object(Map::new())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionType::Scalar => "scalar",
            ResolutionType::Array => "array",
            ResolutionType::Hash => "hash",
        }
    }
}

impl fmt::Display for ResolutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scalar" | "priority" => Ok(ResolutionType::Scalar),
            "array" => Ok(ResolutionType::Array),
            "hash" => Ok(ResolutionType::Hash),
            other => Err(format!("unknown resolution type: {}", other)),
        }
    }
}
