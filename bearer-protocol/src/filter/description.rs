//! Serialization-friendly union describing one filter, per spec.md §3
//! `FilterDescription`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Any,
    All,
    NotFirst,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeDescription {
    pub lo: Option<i64>,
    pub hi: Option<i64>,
    #[serde(default)]
    pub exclude_from: bool,
    #[serde(default)]
    pub exclude_to: bool,
}

/// The wire shape of one filter, as fetched from the config endpoint. Fields
/// are a superset of every concrete filter's inputs; which ones are read
/// depends on `type_name` (see [`super::resolver::build_filter`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterDescription {
    #[serde(rename = "typeName")]
    pub type_name: String,
    #[serde(rename = "childHash")]
    pub child_hash: Option<String>,
    #[serde(rename = "childHashes")]
    pub child_hashes: Option<Vec<String>>,
    pub operator: Option<FilterOperator>,
    pub value: Option<String>,
    pub pattern: Option<String>,
    #[serde(rename = "keyPattern")]
    pub key_pattern: Option<String>,
    #[serde(rename = "valuePattern")]
    pub value_pattern: Option<String>,
    pub range: Option<RangeDescription>,
    #[serde(rename = "stageType")]
    pub stage_type: Option<String>,
}

impl FilterDescription {
    /// Hashes referenced by this description, used by the resolver's
    /// reachability pass.
    pub fn referenced_children(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(h) = &self.child_hash {
            out.push(h.clone());
        }
        if let Some(hs) = &self.child_hashes {
            out.extend(hs.iter().cloned());
        }
        out
    }
}
