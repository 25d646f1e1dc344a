//! Literal default constants from spec.md §3/§4.8/§5/§6.

use std::time::Duration;

pub const FETCH_ENDPOINT: &str = "https://config.bearer.sh/config";
pub const LOGS_ENDPOINT: &str = "https://agent.bearer.sh/logs";

/// No explicit value is given in spec.md; chosen as a reasonable steady-state
/// poll cadence and recorded as an Open Question decision in DESIGN.md.
pub const FETCH_INTERVAL: Duration = Duration::from_secs(30);

pub const IN_FLIGHT_LIMIT: usize = 1000;

/// Default sensitive-key patterns, case-insensitive (spec.md §4.8).
pub const SENSITIVE_KEY_PATTERNS: &[&str] = &[
    "authorization",
    "password",
    "secret",
    "passwd",
    "api.?key",
    "access.?token",
    "auth.?token",
    "credentials",
    "mysql_pwd",
    "stripetoken",
    "card.?number.?",
    "client.?id",
    "client.?secret",
];

/// Default sensitive-value patterns: an email-shaped pattern and a
/// 13-16 digit sequence (card-like), per spec.md §4.8.
pub const SENSITIVE_VALUE_PATTERNS: &[&str] = &[
    r"[\w.+-]+@[\w-]+\.[\w.-]+",
    r"\b\d{13,16}\b",
];
