//! The response body of the config fetch endpoint, per spec.md §6.

use std::collections::HashMap;

use bearer_protocol::{DcrDescription, FilterDescription};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionError {
    pub message: String,
}

/// A fetched (but not yet resolved) configuration description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Description {
    #[serde(rename = "dataCollectionRules", default)]
    pub data_collection_rules: Vec<DcrDescription>,
    #[serde(default)]
    pub filters: HashMap<String, FilterDescription>,
    /// An opaque rule record the agent only echoes back in reports; the
    /// core never interprets it (spec.md §1).
    #[serde(default)]
    pub rules: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<DescriptionError>,
}
