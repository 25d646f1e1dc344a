//! Two-pass filter-description resolver, per spec.md §4.3 — the hardest
//! algorithmic core of the config loop.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    error::ResolveError,
    matcher::{KeyValueMatcher, Matcher, RangeMatcher, RegexpMatcher},
};

use super::{
    description::{FilterDescription, FilterOperator},
    ConnectionErrorFilter, DomainFilter, Filter, FilterSet, HttpMethodFilter, ParamFilter,
    PathFilter, RequestHeadersFilter, ResponseHeadersFilter, StatusCodeFilter, YesFilter,
};

/// Resolves a `{ hash -> description }` mapping into a `{ hash -> filter }`
/// mapping.
///
/// Pass 1 (reachability): every hash a composite description references must
/// have a corresponding description, or resolution fails wholesale.
///
/// Pass 2 (topological instantiation): each description's dependencies are
/// resolved (depth-first) before the description itself is instantiated.
/// Revisiting a hash that is still `unresolved` (on the current DFS path)
/// fails with a circular-dependency error.
///
/// Unknown `type_name`s are skipped (no filter entry produced) rather than
/// failing the whole resolution.
pub fn resolve_filters(
    descriptions: &HashMap<String, FilterDescription>,
) -> Result<HashMap<String, Arc<dyn Filter>>, ResolveError> {
    for desc in descriptions.values() {
        for child in desc.referenced_children() {
            if !descriptions.contains_key(&child) {
                return Err(ResolveError::UndefinedHashes(child));
            }
        }
    }

    let mut resolved_order: Vec<String> = Vec::new();
    let mut resolved_set: HashSet<String> = HashSet::new();
    let mut unresolved: HashSet<String> = HashSet::new();

    for hash in descriptions.keys() {
        visit(
            hash,
            descriptions,
            &mut resolved_order,
            &mut resolved_set,
            &mut unresolved,
        )?;
    }

    let mut filters: HashMap<String, Arc<dyn Filter>> = HashMap::new();
    for hash in resolved_order {
        let desc = &descriptions[&hash];
        if let Some(filter) = build_filter(desc, &filters) {
            filters.insert(hash, Arc::from(filter));
        }
    }
    Ok(filters)
}

fn visit(
    hash: &str,
    descriptions: &HashMap<String, FilterDescription>,
    resolved_order: &mut Vec<String>,
    resolved_set: &mut HashSet<String>,
    unresolved: &mut HashSet<String>,
) -> Result<(), ResolveError> {
    if resolved_set.contains(hash) {
        return Ok(());
    }

    unresolved.insert(hash.to_string());
    let desc = &descriptions[hash];
    for dependency in desc.referenced_children() {
        if unresolved.contains(&dependency) {
            return Err(ResolveError::Circular(hash.to_string(), dependency));
        }
        visit(&dependency, descriptions, resolved_order, resolved_set, unresolved)?;
    }
    unresolved.remove(hash);
    resolved_set.insert(hash.to_string());
    resolved_order.push(hash.to_string());
    Ok(())
}

/// Dispatches filter construction by `type_name`. Children referenced by
/// composite descriptions are assumed already present in `built` (true by
/// construction, since instantiation walks `resolved_order`).
///
/// A description with an incompatible or null pattern yields a filter with
/// its default (all-accepting) matcher rather than no filter; only an
/// unrecognized `type_name` yields `None`.
fn build_filter(desc: &FilterDescription, built: &HashMap<String, Arc<dyn Filter>>) -> Option<Box<dyn Filter>> {
    match desc.type_name.as_str() {
        "domain" => Some(Box::new(with_regex(DomainFilter::default(), desc.pattern.as_deref()))),
        "path" => Some(Box::new(with_regex(PathFilter::default(), desc.pattern.as_deref()))),
        "http_method" => Some(Box::new(
            desc.value
                .as_deref()
                .and_then(HttpMethodFilter::new)
                .unwrap_or_default(),
        )),
        "param" => Some(Box::new(with_key_value(ParamFilter::default(), desc))),
        "request_headers" => Some(Box::new(with_key_value(RequestHeadersFilter::default(), desc))),
        "response_headers" => Some(Box::new(with_key_value(ResponseHeadersFilter::default(), desc))),
        "status_code" => {
            let mut filter = StatusCodeFilter::default();
            if let Some(range) = &desc.range {
                let mut matcher = RangeMatcher::default();
                if let Some(lo) = range.lo {
                    matcher = matcher.from(lo);
                }
                if let Some(hi) = range.hi {
                    matcher = matcher.to(hi);
                }
                if range.exclude_from {
                    matcher = matcher.exclude_from();
                }
                if range.exclude_to {
                    matcher = matcher.exclude_to();
                }
                let _ = filter.set_matcher(Matcher::Range(matcher));
            }
            Some(Box::new(filter))
        }
        "connection_error" => Some(Box::new(ConnectionErrorFilter)),
        "not" => {
            let child = desc.child_hash.as_ref().and_then(|h| built.get(h)).cloned()?;
            Some(Box::new(FilterSet::new(FilterOperator::NotFirst, vec![child])))
        }
        "filter_set" => {
            let children: Vec<Arc<dyn Filter>> = desc
                .child_hashes
                .as_ref()?
                .iter()
                .filter_map(|h| built.get(h).cloned())
                .collect();
            let operator = desc.operator.unwrap_or(FilterOperator::Any);
            Some(Box::new(FilterSet::new(operator, children)))
        }
        "yes" => Some(Box::new(YesFilter)),
        _ => None,
    }
}

fn with_regex<F: Filter + Default>(mut filter: F, pattern: Option<&str>) -> F {
    if let Some(pattern) = pattern {
        if let Ok(re) = RegexpMatcher::new(pattern) {
            let _ = filter.set_matcher(Matcher::Regexp(re));
        }
        // An invalid pattern leaves the filter's default (all-accepting) matcher intact.
    }
    filter
}

fn with_key_value<F: Filter + Default>(mut filter: F, desc: &FilterDescription) -> F {
    if let Ok(matcher) = KeyValueMatcher::new(desc.key_pattern.as_deref(), desc.value_pattern.as_deref()) {
        let _ = filter.set_matcher(Matcher::KeyValue(matcher));
    }
    filter
}
