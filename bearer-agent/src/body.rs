//! Content-type-driven body capture, per spec.md §4.7.

use bearer_protocol::event::{BodySentinel, ParsedBody};
use bearer_protocol::shape_hash::shape_hash;
use bytes::Bytes;

/// The request/response body peek limit: 1 MiB, per spec.md §4.7/§6.
pub const PEEK_LIMIT: usize = 1024 * 1024;

enum ContentKind {
    Json,
    Form,
    Raw,
    Binary,
}

fn classify(content_type: Option<&str>) -> ContentKind {
    let ct = content_type.unwrap_or_default().to_ascii_lowercase();
    let ct = ct.split(';').next().unwrap_or_default().trim();
    match ct {
        "application/json" => ContentKind::Json,
        "application/x-www-form-urlencoded" => ContentKind::Form,
        _ if ct.contains("json")
            || ct.contains("text")
            || ct.contains("xml")
            || ct.contains("x-www-form-urlencoded") =>
        {
            ContentKind::Raw
        }
        _ => ContentKind::Binary,
    }
}

/// Captures a body, returning its parsed representation and (for JSON
/// bodies) a shape hash.
pub fn capture_body(content_type: Option<&str>, bytes: &Bytes) -> (ParsedBody, Option<String>) {
    if bytes.is_empty() {
        return (ParsedBody::Empty, None);
    }
    if bytes.len() >= PEEK_LIMIT {
        return (ParsedBody::Sentinel(BodySentinel::OmittedDueToSize), None);
    }

    match classify(content_type) {
        ContentKind::Json => match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(value) => {
                let hash = shape_hash(&value);
                (ParsedBody::Json(value), Some(hash))
            }
            Err(_) => (ParsedBody::Sentinel(BodySentinel::CouldNotDecodeData), None),
        },
        ContentKind::Form => match std::str::from_utf8(bytes) {
            Ok(s) => (ParsedBody::Form(group_form_pairs(s)), None),
            Err(_) => (ParsedBody::Sentinel(BodySentinel::CouldNotDecodeData), None),
        },
        ContentKind::Raw => match std::str::from_utf8(bytes) {
            Ok(s) => (ParsedBody::Raw(s.to_string()), None),
            Err(_) => (ParsedBody::Sentinel(BodySentinel::CouldNotDecodeData), None),
        },
        ContentKind::Binary => (ParsedBody::Sentinel(BodySentinel::NotShowingBinaryData), None),
    }
}

fn group_form_pairs(body: &str) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        match grouped.iter_mut().find(|(k, _)| k == key.as_ref()) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((key.into_owned(), vec![value.into_owned()])),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_is_parsed_and_hashed() {
        let (body, hash) = capture_body(Some("application/json"), &Bytes::from_static(b"[]"));
        assert!(matches!(body, ParsedBody::Json(serde_json::Value::Array(ref a)) if a.is_empty()));
        assert!(hash.is_some());
    }

    #[test]
    fn empty_body_is_empty() {
        let (body, _) = capture_body(Some("application/json"), &Bytes::new());
        assert!(matches!(body, ParsedBody::Empty));
    }

    #[test]
    fn oversized_body_is_sentinel() {
        let bytes = Bytes::from(vec![b'a'; PEEK_LIMIT]);
        let (body, _) = capture_body(Some("text/plain"), &bytes);
        assert_eq!(body, ParsedBody::Sentinel(BodySentinel::OmittedDueToSize));
    }

    #[test]
    fn binary_content_type_is_sentinel() {
        let (body, _) = capture_body(Some("image/png"), &Bytes::from_static(&[0, 1, 2, 3]));
        assert_eq!(body, ParsedBody::Sentinel(BodySentinel::NotShowingBinaryData));
    }

    #[test]
    fn malformed_json_is_sentinel() {
        let (body, _) = capture_body(Some("application/json"), &Bytes::from_static(b"{not json"));
        assert_eq!(body, ParsedBody::Sentinel(BodySentinel::CouldNotDecodeData));
    }

    #[test]
    fn form_body_groups_repeated_keys() {
        let (body, _) = capture_body(
            Some("application/x-www-form-urlencoded"),
            &Bytes::from_static(b"a=1&a=2&b=3"),
        );
        let ParsedBody::Form(pairs) = body else {
            panic!("expected form body");
        };
        assert_eq!(pairs, vec![("a".to_string(), vec!["1".to_string(), "2".to_string()]), ("b".to_string(), vec!["3".to_string()])]);
    }

    #[test]
    fn non_standard_json_content_type_kept_as_raw() {
        let (body, hash) = capture_body(Some("application/ld+json"), &Bytes::from_static(b"{}"));
        assert!(matches!(body, ParsedBody::Raw(ref s) if s == "{}"));
        assert!(hash.is_none());
    }
}
