//! Resource state exchanged with the engine

use crate::data::Attributes;
use serde::{Deserialize, Serialize};

/// State of a single resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g. `exoscale_compute`)
    pub resource_type: String,

    /// Remote ID
    pub id: String,

    /// Schema version the attributes were written with
    #[serde(default)]
    pub schema_version: u32,

    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            schema_version: 0,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}
