//! Event, filter, matcher, and report data model for the Bearer
//! instrumentation agent.
//!
//! This crate has no I/O: it is the leaf of the dependency order described
//! in spec.md §2 (dispatcher -> matchers -> filters -> filter-resolver),
//! consumed by `bearer-config` (remote fetch loop) and `bearer-agent`
//! (interception pipeline).

pub mod dcr;
pub mod error;
pub mod event;
pub mod filter;
pub mod log_level;
pub mod matcher;
pub mod report;
pub mod shape_hash;

pub use dcr::{DataCollectionRule, DcrDescription, TriggeredRule};
pub use error::{FilterError, ResolveError};
pub use event::{
    BodiesSnapshot, BodySentinel, CallError, CallEvent, ConnectInfo, EventConfig, ParsedBody,
    ReportMeta, RequestSnapshot, ResponseSnapshot, Stage, Topic,
};
pub use filter::{Filter, FilterDescription, FilterKind, FilterOperator};
pub use log_level::LogLevel;
pub use matcher::{KeyValueMatcher, MatchValue, Matcher, RangeMatcher, RegexpMatcher, StringMatcher};
pub use report::{ReportLog, ReportType};
