//! The mutable per-call record carried through the interception pipeline,
//! per spec.md §3 `Event`.

use std::fmt;

use chrono::{DateTime, Utc};
use http::{HeaderMap, Method};
use url::Url;

use crate::{dcr::TriggeredRule, log_level::LogLevel};

/// Which stage of the lifecycle an event is currently being dispatched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Connect,
    Request,
    Response,
    Report,
}

/// Stage tags carried in a report, per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Request,
    Response,
    Bodies,
    Undefined,
    Invalid,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Connect => "ConnectStage",
            Stage::Request => "RequestStage",
            Stage::Response => "ResponseStage",
            Stage::Bodies => "BodiesStage",
            Stage::Undefined => "UndefinedStage",
            Stage::Invalid => "InvalidStage",
        }
    }
}

/// A connection/transport-level error observed at any stage. Deliberately
/// minimal: the agent never interprets or remediates it (spec.md §1
/// Non-goals), only records it for reporting.
#[derive(Debug, Clone)]
pub struct CallError {
    pub code: Option<String>,
    pub message: String,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: HeaderMap,
    /// The request actually associated with this response (e.g. after
    /// redirects); sanitized separately from the top-level request when it
    /// differs, per spec.md §4.8.
    pub request: Option<std::sync::Arc<RequestSnapshot>>,
}

/// A sentinel substituted for a body that could not be captured verbatim,
/// per spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySentinel {
    OmittedDueToSize,
    NotShowingBinaryData,
    CouldNotDecodeData,
    NoBody,
}

impl BodySentinel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodySentinel::OmittedDueToSize => "(omitted due to size)",
            BodySentinel::NotShowingBinaryData => "(not showing binary data)",
            BodySentinel::CouldNotDecodeData => "(could not decode data)",
            BodySentinel::NoBody => "(no body)",
        }
    }
}

/// A parsed request/response body, per spec.md §4.7.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(serde_json::Value),
    Form(Vec<(String, Vec<String>)>),
    Raw(String),
    Empty,
    Sentinel(BodySentinel),
}

#[derive(Debug, Clone, Default)]
pub struct BodiesSnapshot {
    pub request_body: Option<ParsedBody>,
    pub request_body_shape_hash: Option<String>,
    pub response_body: Option<ParsedBody>,
    pub response_body_shape_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub stage: Stage,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Per-event configuration, mutated in place by DCR listeners as the event
/// traverses stages. The log level is monotonically non-decreasing, per
/// spec.md §3 invariants.
#[derive(Debug, Clone, Default)]
pub struct EventConfig {
    pub log_level: LogLevel,
    pub is_active: bool,
}

/// The mutable record carried through the interception pipeline. A single
/// instance accumulates fields as it's dispatched through
/// connect -> request -> response -> bodies -> report; the `topic` names
/// whichever stage is currently being dispatched.
#[derive(Debug, Clone)]
pub struct CallEvent {
    pub topic: Topic,
    pub connect: Option<ConnectInfo>,
    pub request: Option<RequestSnapshot>,
    pub response: Option<ResponseSnapshot>,
    pub bodies: Option<BodiesSnapshot>,
    pub error: Option<CallError>,
    pub config: EventConfig,
    pub triggered: Vec<TriggeredRule>,
    pub report: Option<ReportMeta>,
}

impl CallEvent {
    pub fn new_connect() -> Self {
        Self {
            topic: Topic::Connect,
            connect: None,
            request: None,
            response: None,
            bodies: None,
            error: None,
            config: EventConfig::default(),
            triggered: Vec::new(),
            report: None,
        }
    }

    /// Reached stage, derived from how much of the event has been filled in,
    /// used to populate [`ReportMeta::stage`] when a dispatch short-circuits.
    pub fn furthest_stage_reached(&self) -> Stage {
        if self.bodies.is_some() {
            Stage::Bodies
        } else if self.response.is_some() {
            Stage::Response
        } else if self.request.is_some() {
            Stage::Request
        } else if self.connect.is_some() {
            Stage::Connect
        } else {
            Stage::Undefined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn furthest_stage_reflects_fields_filled() {
        let mut event = CallEvent::new_connect();
        assert_eq!(event.furthest_stage_reached(), Stage::Undefined);
        event.connect = Some(ConnectInfo {
            scheme: "https".into(),
            host: "example.com".into(),
            port: 443,
        });
        assert_eq!(event.furthest_stage_reached(), Stage::Connect);
    }
}
