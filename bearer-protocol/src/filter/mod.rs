//! Compositional matchers assembled into a predicate over a [`crate::event::CallEvent`],
//! per spec.md §3 `Filter` and §4.3.

pub mod description;
pub mod resolver;

use std::sync::Arc;

use crate::{
    error::FilterError,
    event::CallEvent,
    matcher::{KeyValueMatcher, Matcher, MatchValue, RangeMatcher, RegexpMatcher, StringMatcher},
};

pub use description::{FilterDescription, FilterOperator};
pub use resolver::resolve_filters;

/// Discriminator returned by [`Filter::kind`], also used as the wire
/// `typeName` when round-tripping a [`FilterDescription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Domain,
    HttpMethod,
    Path,
    Param,
    RequestHeaders,
    ResponseHeaders,
    StatusCode,
    ConnectionError,
    FilterSet,
    Yes,
}

/// A filter is a predicate over a call, polymorphic over `{ matches_call,
/// kind, set_matcher }`, per spec.md §3/§9.
pub trait Filter: std::fmt::Debug + Send + Sync {
    fn matches_call(&self, event: &CallEvent) -> bool;
    fn kind(&self) -> FilterKind;
    /// Replaces this filter's matcher. Filters that don't use a matcher (or
    /// are handed an incompatible matcher type) reject the call and retain
    /// their existing (safe default) matcher.
    fn set_matcher(&mut self, matcher: Matcher) -> Result<(), FilterError>;
}

macro_rules! regex_filter {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            matcher: RegexpMatcher,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    matcher: RegexpMatcher::any(),
                }
            }
        }

        impl $name {
            pub fn new(matcher: RegexpMatcher) -> Self {
                Self { matcher }
            }
        }

        impl Filter for $name {
            fn kind(&self) -> FilterKind {
                FilterKind::$kind
            }

            fn set_matcher(&mut self, matcher: Matcher) -> Result<(), FilterError> {
                match matcher {
                    Matcher::Regexp(re) => {
                        self.matcher = re;
                        Ok(())
                    }
                    _ => Err(FilterError::IncompatibleMatcher),
                }
            }

            fn matches_call(&self, event: &CallEvent) -> bool {
                self.target(event).map(|s| self.matcher.matches(&s)).unwrap_or(false)
            }
        }
    };
}

regex_filter!(DomainFilter, Domain);
regex_filter!(PathFilter, Path);

impl DomainFilter {
    fn target(&self, event: &CallEvent) -> Option<String> {
        event.request.as_ref().and_then(|r| r.url.host_str().map(str::to_string))
    }
}

impl PathFilter {
    fn target(&self, event: &CallEvent) -> Option<String> {
        event.request.as_ref().map(|r| r.url.path().to_string())
    }
}

/// Case-insensitive string filter over the request method, validated against
/// the RFC 7230 `token` production at construction.
#[derive(Debug, Clone, Default)]
pub struct HttpMethodFilter {
    matcher: StringMatcher,
}

impl HttpMethodFilter {
    /// `^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$`, the RFC 7230 `token` grammar.
    pub fn is_valid_token(value: &str) -> bool {
        !value.is_empty()
            && value.bytes().all(|b| {
                b.is_ascii_alphanumeric()
                    || matches!(
                        b,
                        b'!' | b'#'
                            | b'$'
                            | b'%'
                            | b'&'
                            | b'\''
                            | b'*'
                            | b'+'
                            | b'-'
                            | b'.'
                            | b'^'
                            | b'_'
                            | b'`'
                            | b'|'
                            | b'~'
                    )
            })
    }

    pub fn new(method: &str) -> Option<Self> {
        Self::is_valid_token(method).then(|| Self {
            matcher: StringMatcher::new(method, true),
        })
    }
}

impl Filter for HttpMethodFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::HttpMethod
    }

    fn set_matcher(&mut self, matcher: Matcher) -> Result<(), FilterError> {
        match matcher {
            Matcher::String(s) => {
                self.matcher = s;
                Ok(())
            }
            _ => Err(FilterError::IncompatibleMatcher),
        }
    }

    fn matches_call(&self, event: &CallEvent) -> bool {
        event
            .request
            .as_ref()
            .map(|r| self.matcher.matches(r.method.as_str()))
            .unwrap_or(false)
    }
}

macro_rules! key_value_filter {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            matcher: KeyValueMatcher,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    matcher: KeyValueMatcher::new(None, None).expect("static default pattern compiles"),
                }
            }
        }

        impl $name {
            pub fn new(matcher: KeyValueMatcher) -> Self {
                Self { matcher }
            }
        }

        impl Filter for $name {
            fn kind(&self) -> FilterKind {
                FilterKind::$kind
            }

            fn set_matcher(&mut self, matcher: Matcher) -> Result<(), FilterError> {
                match matcher {
                    Matcher::KeyValue(kv) => {
                        self.matcher = kv;
                        Ok(())
                    }
                    _ => Err(FilterError::IncompatibleMatcher),
                }
            }

            fn matches_call(&self, event: &CallEvent) -> bool {
                self.target(event).map(|v| self.matcher.matches(&v)).unwrap_or(false)
            }
        }
    };
}

key_value_filter!(ParamFilter, Param);
key_value_filter!(RequestHeadersFilter, RequestHeaders);
key_value_filter!(ResponseHeadersFilter, ResponseHeaders);

impl ParamFilter {
    fn target(&self, event: &CallEvent) -> Option<MatchValue> {
        let url = &event.request.as_ref()?.url;
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (k, v) in url.query_pairs() {
            match grouped.iter_mut().find(|(key, _)| key == k.as_ref()) {
                Some((_, values)) => values.push(v.into_owned()),
                None => grouped.push((k.into_owned(), vec![v.into_owned()])),
            }
        }
        Some(MatchValue::from_query_pairs(
            grouped.iter().map(|(k, v)| (k.as_str(), v.clone())),
        ))
    }
}

impl RequestHeadersFilter {
    fn target(&self, event: &CallEvent) -> Option<MatchValue> {
        event.request.as_ref().map(|r| MatchValue::from_header_map(&r.headers))
    }
}

impl ResponseHeadersFilter {
    fn target(&self, event: &CallEvent) -> Option<MatchValue> {
        event.response.as_ref().map(|r| MatchValue::from_header_map(&r.headers))
    }
}

/// Integer range filter over the response status code. Default range is
/// `[100, 600)`, per spec.md §3.
#[derive(Debug, Clone)]
pub struct StatusCodeFilter {
    matcher: RangeMatcher,
}

impl Default for StatusCodeFilter {
    fn default() -> Self {
        Self {
            matcher: RangeMatcher::default().from(100).to(600).exclude_to(),
        }
    }
}

impl StatusCodeFilter {
    pub fn new(matcher: RangeMatcher) -> Self {
        Self { matcher }
    }
}

impl Filter for StatusCodeFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::StatusCode
    }

    fn set_matcher(&mut self, matcher: Matcher) -> Result<(), FilterError> {
        match matcher {
            Matcher::Range(r) => {
                self.matcher = r;
                Ok(())
            }
            _ => Err(FilterError::IncompatibleMatcher),
        }
    }

    fn matches_call(&self, event: &CallEvent) -> bool {
        event
            .response
            .as_ref()
            .map(|r| self.matcher.matches(r.status as i64))
            .unwrap_or(false)
    }
}

/// Matches iff the event carries a transport/stage error.
#[derive(Debug, Clone, Default)]
pub struct ConnectionErrorFilter;

impl Filter for ConnectionErrorFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::ConnectionError
    }

    fn set_matcher(&mut self, _matcher: Matcher) -> Result<(), FilterError> {
        Err(FilterError::MatcherUnsupported)
    }

    fn matches_call(&self, event: &CallEvent) -> bool {
        event.error.is_some()
    }
}

/// Always matches. Used internally as a safe stand-in for an absent filter.
#[derive(Debug, Clone, Default)]
pub struct YesFilter;

impl Filter for YesFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Yes
    }

    fn set_matcher(&mut self, _matcher: Matcher) -> Result<(), FilterError> {
        Err(FilterError::MatcherUnsupported)
    }

    fn matches_call(&self, _event: &CallEvent) -> bool {
        true
    }
}

/// Composite filter over child filters. `Any(∅) = false`, `All(∅) = true`,
/// `NotFirst(∅) = false` (open questions resolved in spec.md §9 / DESIGN.md).
#[derive(Debug, Clone)]
pub struct FilterSet {
    operator: FilterOperator,
    children: Vec<Arc<dyn Filter>>,
}

impl FilterSet {
    pub fn new(operator: FilterOperator, children: Vec<Arc<dyn Filter>>) -> Self {
        Self { operator, children }
    }
}

impl Filter for FilterSet {
    fn kind(&self) -> FilterKind {
        FilterKind::FilterSet
    }

    fn set_matcher(&mut self, _matcher: Matcher) -> Result<(), FilterError> {
        Err(FilterError::MatcherUnsupported)
    }

    fn matches_call(&self, event: &CallEvent) -> bool {
        match self.operator {
            FilterOperator::Any => self.children.iter().any(|f| f.matches_call(event)),
            FilterOperator::All => self.children.iter().all(|f| f.matches_call(event)),
            FilterOperator::NotFirst => match self.children.first() {
                Some(first) => !first.matches_call(event),
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CallEvent, RequestSnapshot, ResponseSnapshot};
    use http::{HeaderMap, Method};
    use url::Url;

    fn event_with_request(url: &str) -> CallEvent {
        let mut event = CallEvent::new_connect();
        event.request = Some(RequestSnapshot {
            method: Method::GET,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
        });
        event
    }

    #[test]
    fn domain_filter_matches_host() {
        let mut filter = DomainFilter::default();
        filter
            .set_matcher(Matcher::Regexp(RegexpMatcher::new("^api\\.example\\.com$").unwrap()))
            .unwrap();
        assert!(filter.matches_call(&event_with_request("https://api.example.com/v1")));
        assert!(!filter.matches_call(&event_with_request("https://evil.com/v1")));
    }

    #[test]
    fn http_method_filter_rejects_invalid_token() {
        assert!(HttpMethodFilter::new("GET").is_some());
        assert!(HttpMethodFilter::new("GE T").is_none());
        assert!(HttpMethodFilter::new("").is_none());
    }

    #[test]
    fn status_code_filter_default_range() {
        let filter = StatusCodeFilter::default();
        let mut event = CallEvent::new_connect();
        event.response = Some(ResponseSnapshot {
            status: 204,
            headers: HeaderMap::new(),
            request: None,
        });
        assert!(filter.matches_call(&event));

        event.response.as_mut().unwrap().status = 600;
        assert!(!filter.matches_call(&event));
    }

    #[test]
    fn status_code_filter_lo_greater_than_hi_never_matches() {
        let filter = StatusCodeFilter::new(RangeMatcher::default().from(600).to(100));
        let mut event = CallEvent::new_connect();
        for status in [100u16, 200, 404, 599] {
            event.response = Some(ResponseSnapshot {
                status,
                headers: HeaderMap::new(),
                request: None,
            });
            assert!(!filter.matches_call(&event));
        }
    }

    #[test]
    fn connection_error_filter() {
        let filter = ConnectionErrorFilter;
        let mut event = CallEvent::new_connect();
        assert!(!filter.matches_call(&event));
        event.error = Some(crate::event::CallError::new("boom"));
        assert!(filter.matches_call(&event));
    }

    #[test]
    fn filter_set_empty_semantics() {
        let event = CallEvent::new_connect();
        assert!(!FilterSet::new(FilterOperator::Any, vec![]).matches_call(&event));
        assert!(FilterSet::new(FilterOperator::All, vec![]).matches_call(&event));
        assert!(!FilterSet::new(FilterOperator::NotFirst, vec![]).matches_call(&event));
    }

    #[test]
    fn filter_set_not_first_only_considers_first_child() {
        let event = event_with_request("https://api.example.com/v1");
        let mut matches_all = DomainFilter::default();
        matches_all
            .set_matcher(Matcher::Regexp(RegexpMatcher::new(".*").unwrap()))
            .unwrap();
        let mut matches_none = DomainFilter::default();
        matches_none
            .set_matcher(Matcher::Regexp(RegexpMatcher::new("^nope$").unwrap()))
            .unwrap();

        let not_first = FilterSet::new(
            FilterOperator::NotFirst,
            vec![Arc::new(matches_all), Arc::new(matches_none)],
        );
        assert!(!not_first.matches_call(&event));
    }
}
