//! Data collection rules: a filter + effective log level + active flag +
//! signed identifier, per spec.md §3 `DataCollectionRule`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{filter::Filter, log_level::LogLevel};

/// A resolved data collection rule. When its filter matches a call (or it
/// has no filter at all), the call's effective log level and active flag are
/// updated from this rule.
#[derive(Clone)]
pub struct DataCollectionRule {
    pub filter_hash: String,
    pub filter: Option<Arc<dyn Filter>>,
    pub log_level: Option<LogLevel>,
    pub is_active: Option<bool>,
    pub params: Value,
    pub signature: String,
}

impl std::fmt::Debug for DataCollectionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCollectionRule")
            .field("filter_hash", &self.filter_hash)
            .field("has_filter", &self.filter.is_some())
            .field("log_level", &self.log_level)
            .field("is_active", &self.is_active)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Flattened, report-ready form of a rule that triggered on a call, per
/// spec.md §3 `ReportLog`. Ordered by trigger order; a given `filterHash`
/// appears at most once per call even though DCR evaluation re-runs at every
/// stage (spec.md §9 open-question resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredRule {
    #[serde(rename = "filterHash")]
    pub filter_hash: String,
    pub params: Value,
    pub signature: String,
}

impl From<&DataCollectionRule> for TriggeredRule {
    fn from(dcr: &DataCollectionRule) -> Self {
        TriggeredRule {
            filter_hash: dcr.filter_hash.clone(),
            params: dcr.params.clone(),
            signature: dcr.signature.clone(),
        }
    }
}

/// The wire shape of one DCR, as fetched from the config endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DcrDescription {
    #[serde(rename = "filterHash")]
    pub filter_hash: String,
    #[serde(rename = "logLevel")]
    pub log_level: Option<String>,
    #[serde(rename = "isActive")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub params: Value,
    pub signature: String,
}
