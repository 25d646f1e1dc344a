use crate::error::ConfigError;

/// An agent secret key, validated against `^app_[0-9a-fA-F]{50}$` (spec.md
/// §6) at parse time. Once constructed, it is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ConfigError::InvalidSecretKey)
        }
    }

    fn is_valid(raw: &str) -> bool {
        match raw.strip_prefix("app_") {
            Some(rest) => rest.len() == 50 && rest.bytes().all(|b| b.is_ascii_hexdigit()),
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::well_formed(format!("app_{}", "a".repeat(50)), true)]
    #[case::wrong_length(format!("app_{}", "a".repeat(49)), false)]
    #[case::missing_prefix("a".repeat(54), false)]
    #[case::non_hex(format!("app_{}z", "a".repeat(49)), false)]
    #[case::uppercase_hex_allowed(format!("app_{}", "A".repeat(50)), true)]
    #[case::empty(String::new(), false)]
    fn parse_validates_shape(#[case] raw: String, #[case] valid: bool) {
        assert_eq!(SecretKey::parse(&raw).is_ok(), valid);
    }
}
