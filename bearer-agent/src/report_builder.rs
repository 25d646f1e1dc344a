//! Turns a finished [`CallEvent`] into a [`ReportLog`] at its effective
//! detail level, per spec.md §4.9.

use bearer_protocol::event::{BodySentinel, CallEvent, ParsedBody};
use bearer_protocol::log_level::LogLevel;
use bearer_protocol::report::{ReportLog, ReportType};
use http::HeaderMap;
use serde_json::Value;

pub fn prepare_report(event: &CallEvent) -> ReportLog {
    let log_level = event.config.log_level;
    let (hostname, port, protocol) = connect_fields(event);
    let report_type = if event.error.is_some() {
        ReportType::RequestError
    } else {
        ReportType::RequestEnd
    };

    let mut report = ReportLog::minimal(log_level, &protocol, &hostname, port, report_type);

    if !log_level.at_least(LogLevel::Restricted) {
        return report;
    }

    if let Some(meta) = &event.report {
        report.start_time = Some(meta.start.timestamp_millis());
        report.end_time = Some(meta.end.timestamp_millis());
        report.stage = Some(meta.stage.as_str().to_string());
    }
    if let Some(request) = &event.request {
        report.path = Some(request.url.path().to_string());
        report.method = Some(request.method.as_str().to_string());
        report.url = Some(request.url.to_string());
    }
    if let Some(response) = &event.response {
        report.status_code = Some(response.status);
    }
    if let Some(err) = &event.error {
        report.error_code = err.code.clone();
        report.error_message = Some(err.message.clone());
    }
    if !event.triggered.is_empty() {
        report.active_data_collection_rules = Some(event.triggered.clone());
    }

    if !log_level.at_least(LogLevel::All) {
        return report;
    }

    if let Some(request) = &event.request {
        report.request_headers = Some(headers_to_json(&request.headers));
    }
    if let Some(response) = &event.response {
        report.response_headers = Some(headers_to_json(&response.headers));
    }
    if let Some(bodies) = &event.bodies {
        if let Some(body) = &bodies.request_body {
            report.request_body = Some(serialize_body(body));
        }
        report.request_body_shape_hash = bodies.request_body_shape_hash.clone();
        if let Some(body) = &bodies.response_body {
            report.response_body = Some(serialize_body(body));
        }
        report.response_body_shape_hash = bodies.response_body_shape_hash.clone();
    }

    report
}

fn connect_fields(event: &CallEvent) -> (String, u16, String) {
    if let Some(connect) = &event.connect {
        return (connect.host.clone(), connect.port, connect.scheme.clone());
    }
    if let Some(request) = &event.request {
        let host = request.url.host_str().unwrap_or_default().to_string();
        let port = request.url.port_or_known_default().unwrap_or(0);
        return (host, port, request.url.scheme().to_string());
    }
    (String::new(), 0, String::new())
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        let entry = map
            .entry(name.as_str().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = entry {
            values.push(Value::String(value.to_str().unwrap_or_default().to_string()));
        }
    }
    Value::Object(map)
}

fn serialize_body(body: &ParsedBody) -> String {
    match body {
        ParsedBody::Json(value) => {
            serde_json::to_string(value).unwrap_or_else(|_| BodySentinel::CouldNotDecodeData.as_str().to_string())
        }
        ParsedBody::Form(pairs) => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, values) in pairs {
                for value in values {
                    serializer.append_pair(key, value);
                }
            }
            serializer.finish()
        }
        ParsedBody::Raw(s) => s.clone(),
        ParsedBody::Empty => BodySentinel::NoBody.as_str().to_string(),
        ParsedBody::Sentinel(sentinel) => sentinel.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearer_protocol::event::{BodiesSnapshot, ConnectInfo, RequestSnapshot};
    use http::Method;
    use url::Url;

    fn base_event() -> CallEvent {
        let mut event = CallEvent::new_connect();
        event.connect = Some(ConnectInfo {
            scheme: "https".to_string(),
            host: "api.example.com".to_string(),
            port: 443,
        });
        event
    }

    #[test]
    fn detected_level_only_carries_always_present_fields() {
        let event = base_event();
        let report = prepare_report(&event);
        assert_eq!(report.hostname, "api.example.com");
        assert!(report.path.is_none());
        assert!(report.request_headers.is_none());
    }

    #[test]
    fn restricted_level_carries_path_and_triggered_rules() {
        let mut event = base_event();
        event.config.log_level = LogLevel::Restricted;
        event.request = Some(RequestSnapshot {
            method: Method::GET,
            url: Url::parse("https://api.example.com/orgs/Acme").unwrap(),
            headers: HeaderMap::new(),
        });
        let report = prepare_report(&event);
        assert_eq!(report.path.as_deref(), Some("/orgs/Acme"));
        assert!(report.request_headers.is_none());
    }

    #[test]
    fn all_level_serializes_json_body() {
        let mut event = base_event();
        event.config.log_level = LogLevel::All;
        event.bodies = Some(BodiesSnapshot {
            request_body: Some(ParsedBody::Json(serde_json::json!({"user": "u"}))),
            ..Default::default()
        });
        let report = prepare_report(&event);
        assert_eq!(report.request_body.as_deref(), Some(r#"{"user":"u"}"#));
    }

    #[test]
    fn empty_body_becomes_no_body_sentinel() {
        let mut event = base_event();
        event.config.log_level = LogLevel::All;
        event.bodies = Some(BodiesSnapshot {
            request_body: Some(ParsedBody::Empty),
            ..Default::default()
        });
        let report = prepare_report(&event);
        assert_eq!(report.request_body.as_deref(), Some("(no body)"));
    }
}
