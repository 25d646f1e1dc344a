//! Three-pass sanitizer run at the report stage, per spec.md §4.8.

use std::sync::Arc;

use bearer_config::Config;
use bearer_protocol::event::{CallEvent, ParsedBody, RequestSnapshot};
use fancy_regex::Regex;
use http::{HeaderMap, HeaderValue};
use serde_json::Value;
use url::Url;

const FILTERED: &str = "[FILTERED]";

/// Replaces the top-level URL, request/response headers, and embedded
/// request/response bodies of `event` in place. Idempotent: sanitizing an
/// already-sanitized event is a no-op.
pub fn sanitize_event(event: &mut CallEvent, config: &Config) {
    if let Some(request) = event.request.as_mut() {
        request.url = sanitize_url(&request.url, config);
        request.headers = sanitize_headers(&request.headers, config);
    }

    if let Some(response) = event.response.as_mut() {
        response.headers = sanitize_headers(&response.headers, config);
        if let Some(embedded) = response.request.as_mut() {
            sanitize_embedded_request(embedded, config);
        }
    }

    if let Some(bodies) = event.bodies.as_mut() {
        if let Some(body) = bodies.request_body.as_mut() {
            sanitize_body(body, config);
        }
        if let Some(body) = bodies.response_body.as_mut() {
            sanitize_body(body, config);
        }
    }
}

fn sanitize_embedded_request(embedded: &mut Arc<RequestSnapshot>, config: &Config) {
    let sanitized_url = sanitize_url(&embedded.url, config);
    let sanitized_headers = sanitize_headers(&embedded.headers, config);
    let snapshot = Arc::make_mut(embedded);
    snapshot.url = sanitized_url;
    snapshot.headers = sanitized_headers;
}

fn sanitize_url(url: &Url, config: &Config) -> Url {
    let mut sanitized = url.clone();

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if !pairs.is_empty() {
        let mut form = sanitized.query_pairs_mut();
        form.clear();
        for (key, value) in &pairs {
            let new_value = if matches_any(key, config.sensitive_key_patterns()) {
                FILTERED.to_string()
            } else {
                filter_sensitive_values(value, config.sensitive_value_patterns())
            };
            form.append_pair(key, &new_value);
        }
        drop(form);
    }

    let sanitized_path = filter_sensitive_values(url.path(), config.sensitive_value_patterns());
    sanitized.set_path(&sanitized_path);
    sanitized
}

fn sanitize_headers(headers: &HeaderMap, config: &Config) -> HeaderMap {
    let mut output = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let new_value = if matches_any(name.as_str(), config.sensitive_key_patterns()) {
            HeaderValue::from_static(FILTERED)
        } else {
            match value.to_str() {
                Ok(s) => {
                    let sanitized = filter_sensitive_values(s, config.sensitive_value_patterns());
                    HeaderValue::from_str(&sanitized).unwrap_or_else(|_| value.clone())
                }
                Err(_) => value.clone(),
            }
        };
        output.append(name.clone(), new_value);
    }
    output
}

fn sanitize_body(body: &mut ParsedBody, config: &Config) {
    match body {
        ParsedBody::Json(value) => sanitize_json(value, config),
        ParsedBody::Form(pairs) => {
            for (key, values) in pairs.iter_mut() {
                let key_sensitive = matches_any(key, config.sensitive_key_patterns());
                for value in values.iter_mut() {
                    *value = if key_sensitive {
                        FILTERED.to_string()
                    } else {
                        filter_sensitive_values(value, config.sensitive_value_patterns())
                    };
                }
            }
        }
        ParsedBody::Raw(_) | ParsedBody::Empty | ParsedBody::Sentinel(_) => {}
    }
}

fn sanitize_json(value: &mut Value, config: &Config) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if matches_any(key, config.sensitive_key_patterns()) {
                    *entry = Value::String(FILTERED.to_string());
                } else {
                    sanitize_json(entry, config);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                sanitize_json(item, config);
            }
        }
        Value::String(s) => {
            *s = filter_sensitive_values(s, config.sensitive_value_patterns());
        }
        _ => {}
    }
}

fn matches_any(input: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(input).unwrap_or(false))
}

/// Replaces every match of any pattern in `input` with `[FILTERED]`.
/// A pattern that errors mid-match (fancy-regex's backtracking can) simply
/// stops contributing further replacements for that pattern.
fn filter_sensitive_values(input: &str, patterns: &[Regex]) -> String {
    let mut result = input.to_string();
    for pattern in patterns {
        result = replace_all(pattern, &result);
    }
    result
}

fn replace_all(pattern: &Regex, input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut last_end = 0;
    for found in pattern.find_iter(input) {
        let Ok(m) = found else { break };
        output.push_str(&input[last_end..m.start()]);
        output.push_str(FILTERED);
        last_end = m.end();
    }
    output.push_str(&input[last_end..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearer_config::SecretKey;
    use bearer_protocol::event::{BodiesSnapshot, ResponseSnapshot};
    use http::Method;
    use rstest::rstest;

    fn config() -> Config {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        Config::builder(Some(key)).build().unwrap()
    }

    fn event_with_url(url: &str) -> CallEvent {
        let mut event = CallEvent::new_connect();
        event.request = Some(RequestSnapshot {
            method: Method::GET,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
        });
        event
    }

    #[test]
    fn sensitive_query_param_is_filtered() {
        let cfg = config();
        let mut event = event_with_url("https://api.example.com/orgs/Acme?client_id=abc");
        sanitize_event(&mut event, &cfg);
        let url = &event.request.unwrap().url;
        assert!(url.query().unwrap().contains("client_id=%5BFILTERED%5D"));
    }

    #[test]
    fn sanitizing_twice_is_a_no_op() {
        let cfg = config();
        let mut event = event_with_url("https://api.example.com/orgs/Acme?client_id=abc");
        sanitize_event(&mut event, &cfg);
        let once = event.request.as_ref().unwrap().url.clone();
        sanitize_event(&mut event, &cfg);
        let twice = event.request.as_ref().unwrap().url.clone();
        assert_eq!(once, twice);
    }

    #[rstest]
    #[case::authorization("authorization", true)]
    #[case::api_key("api-key", true)]
    #[case::api_key_underscore("api_key", true)]
    #[case::access_token("access-token", true)]
    #[case::client_id("client-id", true)]
    #[case::client_secret("client_secret", true)]
    #[case::mysql_pwd("mysql_pwd", true)]
    #[case::stripetoken("stripetoken", true)]
    #[case::content_type("content-type", false)]
    #[case::x_request_id("x-request-id", false)]
    fn sensitive_header_key_is_filtered(#[case] header: &str, #[case] should_filter: bool) {
        let cfg = config();
        let mut event = event_with_url("https://api.example.com/v1");
        event
            .request
            .as_mut()
            .unwrap()
            .headers
            .insert(http::HeaderName::from_bytes(header.as_bytes()).unwrap(), HeaderValue::from_static("xyz"));
        sanitize_event(&mut event, &cfg);
        let value = event.request.unwrap().headers.get(header).unwrap().clone();
        if should_filter {
            assert_eq!(value, FILTERED);
        } else {
            assert_eq!(value, "xyz");
        }
    }

    #[test]
    fn sensitive_json_body_key_is_filtered() {
        let cfg = config();
        let mut event = event_with_url("https://api.example.com/login");
        event.bodies = Some(BodiesSnapshot {
            request_body: Some(ParsedBody::Json(
                serde_json::json!({"password": "p", "user": "u"}),
            )),
            ..Default::default()
        });
        sanitize_event(&mut event, &cfg);
        let ParsedBody::Json(body) = event.bodies.unwrap().request_body.unwrap() else {
            panic!("expected json body");
        };
        assert_eq!(body["password"], serde_json::json!("[FILTERED]"));
        assert_eq!(body["user"], serde_json::json!("u"));
    }

    #[test]
    fn embedded_response_request_is_sanitized_separately() {
        let cfg = config();
        let mut event = event_with_url("https://api.example.com/v1");
        event.response = Some(ResponseSnapshot {
            status: 200,
            headers: HeaderMap::new(),
            request: Some(Arc::new(RequestSnapshot {
                method: Method::GET,
                url: Url::parse("https://api.example.com/redirected?client_id=abc").unwrap(),
                headers: HeaderMap::new(),
            })),
        });
        sanitize_event(&mut event, &cfg);
        let embedded_url = &event.response.unwrap().request.unwrap().url;
        assert!(embedded_url.query().unwrap().contains("%5BFILTERED%5D"));
    }
}
