use std::sync::{Arc, RwLock};

use http::HeaderMap;

/// A generic, possibly self-referential container that [`super::KeyValueMatcher`]
/// can walk.
///
/// `Array` and `Map` hold their elements behind `Arc<RwLock<_>>` rather than a
/// plain owned `Vec`, so that a caller assembling host data (headers, query
/// parameters, parsed bodies) that genuinely contains back-references can
/// represent that cycle instead of it being ruled out by construction. The
/// matcher's cycle guard (see [`super::KeyValueMatcher::matches`]) is exercised
/// against exactly this shape.
#[derive(Debug, Clone)]
pub enum MatchValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Arc<RwLock<Vec<MatchValue>>>),
    Map(Arc<RwLock<Vec<(String, MatchValue)>>>),
}

impl MatchValue {
    pub fn string(s: impl Into<String>) -> Self {
        MatchValue::String(s.into())
    }

    pub fn array(items: Vec<MatchValue>) -> Self {
        MatchValue::Array(Arc::new(RwLock::new(items)))
    }

    pub fn map(entries: Vec<(String, MatchValue)>) -> Self {
        MatchValue::Map(Arc::new(RwLock::new(entries)))
    }

    /// A stable identity for cycle detection: `None` for leaves (which can
    /// never be part of a cycle), `Some(pointer address)` for containers.
    pub(super) fn identity(&self) -> Option<usize> {
        match self {
            MatchValue::Array(a) => Some(Arc::as_ptr(a) as usize),
            MatchValue::Map(m) => Some(Arc::as_ptr(m) as usize),
            _ => None,
        }
    }

    /// Renders a leaf value as a string for [`super::RegexpMatcher`] /
    /// [`super::StringMatcher`] style comparisons; containers have no string
    /// representation.
    pub fn as_str(&self) -> Option<String> {
        match self {
            MatchValue::String(s) => Some(s.clone()),
            MatchValue::Number(n) => Some(n.to_string()),
            MatchValue::Bool(b) => Some(b.to_string()),
            MatchValue::Null => Some(String::new()),
            MatchValue::Array(_) | MatchValue::Map(_) => None,
        }
    }

    /// Builds a [`MatchValue::Map`] from URL query parameters (key -> list of
    /// values, mirroring `url::Url::query_pairs`'s repeated-key semantics).
    pub fn from_query_pairs<'a>(pairs: impl Iterator<Item = (&'a str, Vec<String>)>) -> Self {
        MatchValue::map(
            pairs
                .map(|(k, vs)| {
                    (
                        k.to_string(),
                        MatchValue::array(vs.into_iter().map(MatchValue::String).collect()),
                    )
                })
                .collect(),
        )
    }

    /// Builds a [`MatchValue::Map`] from an `http::HeaderMap`.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for name in headers.keys() {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|v| v.to_str().unwrap_or_default().to_string())
                .collect();
            grouped.push((name.as_str().to_string(), values));
        }
        MatchValue::map(
            grouped
                .into_iter()
                .map(|(k, vs)| (k, MatchValue::array(vs.into_iter().map(MatchValue::String).collect())))
                .collect(),
        )
    }

    /// Converts a parsed JSON body into a [`MatchValue`] tree (acyclic, since
    /// `serde_json::Value` cannot represent cycles).
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => MatchValue::Null,
            serde_json::Value::Bool(b) => MatchValue::Bool(*b),
            serde_json::Value::Number(n) => MatchValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => MatchValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                MatchValue::array(items.iter().map(MatchValue::from_json).collect())
            }
            serde_json::Value::Object(map) => MatchValue::map(
                map.iter()
                    .map(|(k, v)| (k.clone(), MatchValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}
