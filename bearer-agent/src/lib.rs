//! Event dispatcher, interception pipeline, sanitizer, and async report
//! sender for the Bearer instrumentation agent.
//!
//! Depends on [`bearer_protocol`] (data model) and [`bearer_config`]
//! (remote configuration); this crate supplies the behavior that turns an
//! intercepted HTTP call into a shipped [`bearer_protocol::ReportLog`], per
//! spec.md §4.1, §4.5-§4.10 and §5.

pub mod agent;
pub mod body;
pub mod dcr_provider;
pub mod dispatcher;
pub mod error;
pub mod interceptor;
#[cfg(feature = "subscriber")]
pub mod logging;
pub mod report_builder;
pub mod round_tripper;
pub mod sanitize;
pub mod sender;

pub use agent::Agent;
pub use dispatcher::{Dispatcher, Listener};
pub use error::{SenderError, StageError, TransportError};
pub use interceptor::Interceptor;
pub use round_tripper::{ReqwestRoundTripper, Request, Response, RoundTripper};
pub use sender::{ReportTransport, ReqwestReportTransport, SenderHandle};
