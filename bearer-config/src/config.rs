use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bearer_protocol::{DataCollectionRule, Filter};
use fancy_regex::Regex;
use url::Url;

use crate::defaults;
use crate::error::ConfigError;
use crate::secret_key::SecretKey;

#[derive(Default)]
struct ResolvedState {
    filters: HashMap<String, Arc<dyn Filter>>,
    rules: Vec<DataCollectionRule>,
}

/// Process-wide configuration. Immutable after `build`, except for the
/// `{filters, dataCollectionRules}` pair, which the fetcher replaces
/// atomically (spec.md §3 "Config").
pub struct Config {
    secret_key: Option<SecretKey>,
    disabled: bool,
    environment_tag: Option<String>,
    fetch_endpoint: Url,
    logs_endpoint: Url,
    fetch_interval: Duration,
    in_flight_limit: usize,
    sensitive_key_patterns: Vec<Regex>,
    sensitive_value_patterns: Vec<Regex>,
    logger: tracing::Dispatch,
    state: RwLock<ResolvedState>,
}

impl Config {
    pub fn builder(secret_key: Option<SecretKey>) -> ConfigBuilder {
        ConfigBuilder::new(secret_key)
    }

    /// Reads `BEARER_SECRETKEY` from the environment. Per spec.md §6: if
    /// unset or ill-formed, the agent runs disabled but still attempts the
    /// background fetch, rather than failing construction outright — unlike
    /// `ConfigBuilder::build`, which is fatal on a directly-supplied
    /// ill-formed key (spec.md §7 "Configuration").
    pub fn from_env() -> Config {
        let secret_key = match std::env::var("BEARER_SECRETKEY") {
            Ok(raw) => match SecretKey::parse(&raw) {
                Ok(key) => Some(key),
                Err(err) => {
                    tracing::warn!(%err, "BEARER_SECRETKEY is set but ill-formed, running disabled");
                    None
                }
            },
            Err(_) => {
                tracing::warn!("BEARER_SECRETKEY is not set, running disabled");
                None
            }
        };
        let disabled = secret_key.is_none();
        let mut builder = ConfigBuilder::new(secret_key);
        builder.disabled = disabled;
        builder
            .build()
            .expect("default configuration is always well-formed")
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn secret_key(&self) -> Option<&SecretKey> {
        self.secret_key.as_ref()
    }

    pub fn environment_tag(&self) -> Option<&str> {
        self.environment_tag.as_deref()
    }

    pub fn fetch_endpoint(&self) -> &Url {
        &self.fetch_endpoint
    }

    pub fn logs_endpoint(&self) -> &Url {
        &self.logs_endpoint
    }

    pub fn fetch_interval(&self) -> Duration {
        self.fetch_interval
    }

    pub fn in_flight_limit(&self) -> usize {
        self.in_flight_limit
    }

    pub fn sensitive_key_patterns(&self) -> &[Regex] {
        &self.sensitive_key_patterns
    }

    pub fn sensitive_value_patterns(&self) -> &[Regex] {
        &self.sensitive_value_patterns
    }

    pub fn logger(&self) -> &tracing::Dispatch {
        &self.logger
    }

    pub fn filter(&self, hash: &str) -> Option<Arc<dyn Filter>> {
        self.state.read().unwrap().filters.get(hash).cloned()
    }

    pub fn rules(&self) -> Vec<DataCollectionRule> {
        self.state.read().unwrap().rules.clone()
    }

    /// Atomically replaces the fetched filter set and rule list. Called back
    /// into by the fetcher on every successful poll (spec.md §4.4).
    pub fn replace_resolved(&self, filters: HashMap<String, Arc<dyn Filter>>, rules: Vec<DataCollectionRule>) {
        let mut state = self.state.write().unwrap();
        state.filters = filters;
        state.rules = rules;
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("disabled", &self.disabled)
            .field("environment_tag", &self.environment_tag)
            .field("fetch_endpoint", &self.fetch_endpoint)
            .field("logs_endpoint", &self.logs_endpoint)
            .field("fetch_interval", &self.fetch_interval)
            .field("in_flight_limit", &self.in_flight_limit)
            .finish_non_exhaustive()
    }
}

/// A single named configuration operation, applied in order by
/// `ConfigBuilder::apply`. Per spec.md §9: unknown options are not accepted
/// at the type level, since there is no string-keyed path at all.
pub struct ConfigOp(Box<dyn FnOnce(&mut ConfigBuilder) -> Result<(), ConfigError>>);

impl ConfigOp {
    fn new(f: impl FnOnce(&mut ConfigBuilder) -> Result<(), ConfigError> + 'static) -> Self {
        Self(Box::new(f))
    }
}

pub fn disabled(value: bool) -> ConfigOp {
    ConfigOp::new(move |b| {
        b.disabled = value;
        Ok(())
    })
}

pub fn environment_tag(tag: impl Into<String>) -> ConfigOp {
    let tag = tag.into();
    ConfigOp::new(move |b| {
        b.environment_tag = Some(tag);
        Ok(())
    })
}

/// Extends the default sensitive-key pattern list (spec.md §4.8) with
/// additional user-supplied patterns.
pub fn sensitive_keys(patterns: Vec<String>) -> ConfigOp {
    ConfigOp::new(move |b| {
        b.sensitive_key_patterns.extend(patterns);
        Ok(())
    })
}

/// Extends the default sensitive-value pattern list with additional
/// user-supplied patterns.
pub fn sensitive_regexps(patterns: Vec<String>) -> ConfigOp {
    ConfigOp::new(move |b| {
        b.sensitive_value_patterns.extend(patterns);
        Ok(())
    })
}

pub fn endpoints(fetch: impl Into<String>, logs: impl Into<String>) -> ConfigOp {
    let fetch = fetch.into();
    let logs = logs.into();
    ConfigOp::new(move |b| {
        b.fetch_endpoint = fetch;
        b.logs_endpoint = logs;
        Ok(())
    })
}

pub fn logger(dispatch: tracing::Dispatch) -> ConfigOp {
    ConfigOp::new(move |b| {
        b.logger = Some(dispatch);
        Ok(())
    })
}

pub fn in_flight_limit(limit: usize) -> ConfigOp {
    ConfigOp::new(move |b| {
        b.in_flight_limit = limit;
        Ok(())
    })
}

pub struct ConfigBuilder {
    secret_key: Option<SecretKey>,
    disabled: bool,
    environment_tag: Option<String>,
    fetch_endpoint: String,
    logs_endpoint: String,
    fetch_interval: Duration,
    in_flight_limit: usize,
    sensitive_key_patterns: Vec<String>,
    sensitive_value_patterns: Vec<String>,
    logger: Option<tracing::Dispatch>,
}

impl ConfigBuilder {
    pub fn new(secret_key: Option<SecretKey>) -> Self {
        let disabled = secret_key.is_none();
        Self {
            secret_key,
            disabled,
            environment_tag: None,
            fetch_endpoint: defaults::FETCH_ENDPOINT.to_string(),
            logs_endpoint: defaults::LOGS_ENDPOINT.to_string(),
            fetch_interval: defaults::FETCH_INTERVAL,
            in_flight_limit: defaults::IN_FLIGHT_LIMIT,
            sensitive_key_patterns: defaults::SENSITIVE_KEY_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sensitive_value_patterns: defaults::SENSITIVE_VALUE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            logger: None,
        }
    }

    /// Applies a sequence of `ConfigOp`s in registration order, per
    /// spec.md §9 ("a sequence of configuration operations applied in
    /// order").
    pub fn apply(mut self, ops: Vec<ConfigOp>) -> Result<Self, ConfigError> {
        for op in ops {
            (op.0)(&mut self)?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let fetch_endpoint = Url::parse(&self.fetch_endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(self.fetch_endpoint.clone()))?;
        let logs_endpoint = Url::parse(&self.logs_endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(self.logs_endpoint.clone()))?;

        let sensitive_key_patterns = compile_all(&self.sensitive_key_patterns, true)?;
        let sensitive_value_patterns = compile_all(&self.sensitive_value_patterns, false)?;

        Ok(Config {
            secret_key: self.secret_key,
            disabled: self.disabled,
            environment_tag: self.environment_tag,
            fetch_endpoint,
            logs_endpoint,
            fetch_interval: self.fetch_interval,
            in_flight_limit: self.in_flight_limit,
            sensitive_key_patterns,
            sensitive_value_patterns,
            logger: self.logger.unwrap_or_else(tracing::Dispatch::none),
            state: RwLock::new(ResolvedState::default()),
        })
    }
}

fn compile_all(patterns: &[String], case_insensitive: bool) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            let source = if case_insensitive {
                format!("(?i){pattern}")
            } else {
                pattern.clone()
            };
            Regex::new(&source).map_err(|source| ConfigError::InvalidRegex {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretKey {
        SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap()
    }

    #[test]
    fn builder_applies_ops_in_order() {
        let cfg = Config::builder(Some(key()))
            .apply(vec![
                environment_tag("staging"),
                endpoints("https://config.example.test/config", "https://agent.example.test/logs"),
                disabled(true),
            ])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(cfg.environment_tag(), Some("staging"));
        assert_eq!(cfg.fetch_endpoint().as_str(), "https://config.example.test/config");
        assert!(cfg.is_disabled());
    }

    #[test]
    fn default_sensitive_patterns_compile() {
        let cfg = Config::builder(Some(key())).build().unwrap();
        assert_eq!(
            cfg.sensitive_key_patterns().len(),
            defaults::SENSITIVE_KEY_PATTERNS.len()
        );
        assert_eq!(
            cfg.sensitive_value_patterns().len(),
            defaults::SENSITIVE_VALUE_PATTERNS.len()
        );
    }

    #[test]
    fn invalid_user_regex_is_fatal() {
        let result = Config::builder(Some(key()))
            .apply(vec![sensitive_keys(vec!["(".to_string()])])
            .unwrap()
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidRegex { .. })));
    }

    #[test]
    fn invalid_endpoint_is_fatal() {
        let result = Config::builder(Some(key()))
            .apply(vec![endpoints("not a url", "also not a url")])
            .unwrap()
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint(_))));
    }

    #[test]
    fn from_env_runs_disabled_without_secret_key() {
        std::env::remove_var("BEARER_SECRETKEY");
        let cfg = Config::from_env();
        assert!(cfg.is_disabled());
        assert!(cfg.secret_key().is_none());
    }

    #[test]
    fn replace_resolved_swaps_state() {
        let cfg = Config::builder(Some(key())).build().unwrap();
        assert!(cfg.rules().is_empty());
        cfg.replace_resolved(HashMap::new(), vec![]);
        assert!(cfg.rules().is_empty());
    }
}
