//! Catalog resources
//!
//! A catalog is the published list of example resources. Only `url` carries
//! meaning for the harness; every other field is kept verbatim as display
//! metadata so it can be echoed back in logs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The catalog document as served by the remote endpoint and the local fallback file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    pub data: Vec<Resource>,
}

/// A single published example resource. Identity is the `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub url: String,
    /// Everything else the catalog publishes about the resource.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Resource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Human readable title, if the catalog provides one.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }
}
