//! The five-stage interception pipeline, per spec.md §4.5.
//!
//! `Interceptor<R>` wraps an inner [`RoundTripper`] and is itself a
//! `RoundTripper`, so a host swaps its transport for one with an
//! `Interceptor` in front of it and otherwise changes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use bearer_config::Config;
use bearer_protocol::event::{
    BodiesSnapshot, CallError, CallEvent, ConnectInfo, ReportMeta, RequestSnapshot, ResponseSnapshot,
};
use bearer_protocol::event::Topic;
use chrono::Utc;
use http::HeaderMap;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::body::capture_body;
use crate::dispatcher::Dispatcher;
use crate::error::{StageError, TransportError};
use crate::report_builder::prepare_report;
use crate::round_tripper::{Request, Response, RoundTripper};
use crate::sanitize::sanitize_event;
use crate::sender::SenderHandle;

/// Default ports for the schemes the connect validator recognizes, per
/// spec.md §4.5.
fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        "socks5" => Some(1080),
        _ => None,
    }
}

/// `[A-Za-z][-+.\w]+`: a letter followed by one or more of letter, digit,
/// underscore, hyphen, plus, or dot.
fn scheme_is_valid(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    let Some(first) = chars.next() else { return false };
    if !first.is_ascii_alphabetic() {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    !rest.is_empty()
        && rest
            .iter()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_'))
}

fn validate_connect(connect: &ConnectInfo) -> Result<(), &'static str> {
    if !scheme_is_valid(&connect.scheme) {
        return Err("scheme does not match [A-Za-z][-+.\\w]+");
    }
    if connect.port == 0 || connect.port > 0x7FFF {
        return Err("port is out of range (0, 2^15-1]");
    }
    Ok(())
}

fn effective_connect(url: &Url) -> Result<ConnectInfo, &'static str> {
    let scheme = url.scheme().to_string();
    let port = match url.port() {
        Some(p) => p,
        None => default_port(&scheme).ok_or("no explicit port and scheme has no default")?,
    };
    Ok(ConnectInfo {
        scheme,
        host: url.host_str().unwrap_or_default().to_string(),
        port,
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// A decorator: wraps `inner` in the connect/request/response/report
/// pipeline, per spec.md §4.5.
pub struct Interceptor<R> {
    inner: R,
    dispatcher: Arc<Dispatcher>,
    config: Arc<Config>,
    sender: Arc<SenderHandle>,
}

impl<R: RoundTripper> Interceptor<R> {
    pub fn new(inner: R, dispatcher: Arc<Dispatcher>, config: Arc<Config>, sender: Arc<SenderHandle>) -> Self {
        Self {
            inner,
            dispatcher,
            config,
            sender,
        }
    }

    async fn intercept(&self, request: Request) -> Result<Response, TransportError> {
        let cancel = CancellationToken::new();
        let start = Utc::now();
        let mut event = CallEvent::new_connect();

        let connect = match effective_connect(&request.url).and_then(|c| validate_connect(&c).map(|_| c)) {
            Ok(connect) => connect,
            Err(reason) => {
                let invalid = ConnectInfo {
                    scheme: request.url.scheme().to_string(),
                    host: request.url.host_str().unwrap_or_default().to_string(),
                    port: request.url.port().unwrap_or(0),
                };
                let target = format!("{}:{}", invalid.host, invalid.port);
                let stage_err = StageError::InvalidConnectTarget(target, reason);
                event.connect = Some(invalid);
                event.error = Some(CallError::with_code(stage_err.to_string(), "INVALID_CONNECT_TARGET"));
                self.finish(event, start, &cancel).await;
                return Err(TransportError::Other(stage_err.to_string()));
            }
        };
        event.connect = Some(connect);

        if let Err(err) = self.dispatcher.dispatch(Topic::Connect, &mut event, &cancel) {
            event.error = Some(CallError::new(err.to_string()));
            self.finish(event, start, &cancel).await;
            return Err(TransportError::Other(err.to_string()));
        }

        event.request = Some(RequestSnapshot {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
        });
        if let Err(err) = self.dispatcher.dispatch(Topic::Request, &mut event, &cancel) {
            event.error = Some(CallError::new(err.to_string()));
            self.finish(event, start, &cancel).await;
            return Err(TransportError::Other(err.to_string()));
        }

        let request_body = request.body.clone();
        let request_content_type = header_value(&request.headers, "content-type");
        let outcome = self.inner.round_trip(request).await;

        match outcome {
            Ok(response) => {
                event.response = Some(ResponseSnapshot {
                    status: response.status,
                    headers: response.headers.clone(),
                    request: None,
                });
                let dispatch_result = self.dispatcher.dispatch(Topic::Response, &mut event, &cancel);

                let (request_parsed, request_hash) = capture_body(request_content_type.as_deref(), &request_body);
                let response_content_type = header_value(&response.headers, "content-type");
                let (response_parsed, response_hash) = capture_body(response_content_type.as_deref(), &response.body);
                event.bodies = Some(BodiesSnapshot {
                    request_body: Some(request_parsed),
                    request_body_shape_hash: request_hash,
                    response_body: Some(response_parsed),
                    response_body_shape_hash: response_hash,
                });

                if let Err(err) = dispatch_result {
                    event.error = Some(CallError::new(err.to_string()));
                }
                self.finish(event, start, &cancel).await;
                Ok(response)
            }
            Err(err) => {
                event.error = Some(CallError::new(err.to_string()));
                self.finish(event, start, &cancel).await;
                Err(err)
            }
        }
    }

    async fn finish(&self, mut event: CallEvent, start: chrono::DateTime<Utc>, cancel: &CancellationToken) {
        let stage = event.furthest_stage_reached();
        event.report = Some(ReportMeta {
            stage,
            start,
            end: Utc::now(),
        });
        let _ = self.dispatcher.dispatch(Topic::Report, &mut event, cancel);
        sanitize_event(&mut event, &self.config);
        let report = prepare_report(&event);
        let _ = self.sender.submit(report).await;
    }
}

#[async_trait]
impl<R: RoundTripper> RoundTripper for Interceptor<R> {
    async fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        self.intercept(request).await
    }
}
