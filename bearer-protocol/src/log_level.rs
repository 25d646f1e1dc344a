use std::{cmp::Ordering, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Detail tier of a report, per spec.md §3 `LogLevel`.
///
/// Ordered `Detected < Restricted < All`. Missing values default to
/// [`LogLevel::Detected`]; values that fail to parse fold to
/// [`LogLevel::Restricted`] rather than erroring, since a misconfigured
/// remote rule should degrade gracefully instead of disabling reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Detected,
    Restricted,
    All,
}

impl FromStr for LogLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "DETECTED" => LogLevel::Detected,
            "ALL" => LogLevel::All,
            // any other string, including "RESTRICTED", folds here.
            _ => LogLevel::Restricted,
        })
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        // Infallible: FromStr never errors, it folds unknown values to Restricted.
        Ok(raw.parse().unwrap())
    }
}

impl LogLevel {
    /// Raises `self` to `other` if `other` is higher, per the invariant that
    /// the effective log level never decreases during stage traversal.
    pub fn raise_to(&mut self, other: LogLevel) {
        if other > *self {
            *self = other;
        }
    }

    pub fn at_least(self, floor: LogLevel) -> bool {
        self >= floor
    }
}
