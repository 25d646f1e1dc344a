//! The background config fetch loop, per spec.md §4.4.
//!
//! Owns a ticker at the configured interval and a cancellation signal. On
//! each tick it POSTs a `{runtime, agent, application, secretKey}` envelope
//! to the fetch endpoint, parses the response as a `Description`, and calls
//! back into the `Config` to atomically swap `{filters, dataCollectionRules}`.
//! Any failure — non-2xx, a non-empty `error` object, or a parse failure —
//! leaves the current configuration untouched and is logged at WARN.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bearer_protocol::{filter::resolve_filters, DataCollectionRule, LogLevel};
use url::Url;

use crate::config::Config;
use crate::description::Description;
use crate::envelope::{AgentInfo, ApplicationInfo, FetchEnvelope, RuntimeInfo};
use crate::error::FetchError;

/// The narrow transport boundary the fetcher drives, mocked in tests instead
/// of the full `reqwest::Client` (spec.md §10.5 test-tooling mapping).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigTransport: Send + Sync {
    async fn fetch(&self, url: &Url, envelope: &FetchEnvelope) -> Result<Description, FetchError>;
}

/// Production transport: POSTs the envelope and parses the JSON response.
pub struct ReqwestConfigTransport {
    client: reqwest::Client,
}

impl Default for ReqwestConfigTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ConfigTransport for ReqwestConfigTransport {
    async fn fetch(&self, url: &Url, envelope: &FetchEnvelope) -> Result<Description, FetchError> {
        let response = self
            .client
            .post(url.clone())
            .header("Accept", "application/json")
            .header("Authorization", envelope.secret_key.clone())
            .json(envelope)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let description: Description = serde_json::from_str(&body)?;
        if let Some(error) = &description.error {
            return Err(FetchError::RemoteError(error.message.clone()));
        }
        Ok(description)
    }
}

/// Drives one periodic poll loop against a `Config`. Cancellation is a
/// `tokio::sync::watch` flip, drained cooperatively between ticks.
pub struct Fetcher<T: ConfigTransport = ReqwestConfigTransport> {
    config: Arc<Config>,
    transport: T,
}

impl Fetcher<ReqwestConfigTransport> {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            transport: ReqwestConfigTransport::default(),
        }
    }
}

impl<T: ConfigTransport + 'static> Fetcher<T> {
    pub fn with_transport(config: Arc<Config>, transport: T) -> Self {
        Self { config, transport }
    }

    /// Spawns the cooperative ticker loop and returns a handle that stops it.
    pub fn spawn(self) -> FetcherHandle {
        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.fetch_interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.poll_once().await;
                    }
                    _ = stop_rx.changed() => {
                        break;
                    }
                }
            }
        });
        FetcherHandle { stop_tx, handle }
    }

    #[tracing::instrument(skip(self), fields(endpoint = %self.config.fetch_endpoint()))]
    pub async fn poll_once(&self) {
        let envelope = self.build_envelope();
        match self.transport.fetch(self.config.fetch_endpoint(), &envelope).await {
            Ok(description) => self.apply(description),
            Err(err) => {
                tracing::warn!(%err, "config fetch failed, keeping previous configuration");
            }
        }
    }

    fn build_envelope(&self) -> FetchEnvelope {
        let environment = self.config.environment_tag().unwrap_or("").to_string();
        let encoded_environment = URL_SAFE_NO_PAD.encode(environment.as_bytes());
        FetchEnvelope {
            secret_key: self
                .config
                .secret_key()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
            app_environment: encoded_environment.clone(),
            application: ApplicationInfo {
                environment: encoded_environment,
            },
            runtime: RuntimeInfo::detect(),
            agent: AgentInfo::default(),
        }
    }

    fn apply(&self, description: Description) {
        let filters = match resolve_filters(&description.filters) {
            Ok(filters) => filters,
            Err(err) => {
                tracing::warn!(%err, "received an unresolvable filter set, keeping previous configuration");
                return;
            }
        };

        let rules = description
            .data_collection_rules
            .iter()
            .map(|dcr| DataCollectionRule {
                filter_hash: dcr.filter_hash.clone(),
                filter: filters.get(&dcr.filter_hash).cloned(),
                log_level: dcr.log_level.as_deref().map(|s| s.parse::<LogLevel>().unwrap()),
                is_active: dcr.is_active,
                params: dcr.params.clone(),
                signature: dcr.signature.clone(),
            })
            .collect::<Vec<_>>();

        self.config.replace_resolved(filters, rules);
    }
}

pub struct FetcherHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl FetcherHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret_key::SecretKey;
    use std::collections::HashMap;

    fn config() -> Arc<Config> {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        Arc::new(Config::builder(Some(key)).build().unwrap())
    }

    #[tokio::test]
    async fn successful_poll_replaces_rules() {
        let cfg = config();
        let mut transport = MockConfigTransport::new();
        transport.expect_fetch().returning(|_, _| {
            Ok(Description {
                data_collection_rules: vec![],
                filters: HashMap::new(),
                rules: None,
                error: None,
            })
        });

        let fetcher = Fetcher::with_transport(cfg.clone(), transport);
        fetcher.poll_once().await;
        assert!(cfg.rules().is_empty());
    }

    #[tokio::test]
    async fn failed_poll_keeps_previous_configuration() {
        let cfg = config();
        cfg.replace_resolved(
            HashMap::new(),
            vec![DataCollectionRule {
                filter_hash: "h".to_string(),
                filter: None,
                log_level: None,
                is_active: None,
                params: serde_json::Value::Null,
                signature: "sig".to_string(),
            }],
        );

        let mut transport = MockConfigTransport::new();
        transport
            .expect_fetch()
            .returning(|_, _| Err(FetchError::HttpStatus(reqwest::StatusCode::INTERNAL_SERVER_ERROR)));

        let fetcher = Fetcher::with_transport(cfg.clone(), transport);
        fetcher.poll_once().await;
        assert_eq!(cfg.rules().len(), 1);
    }

    #[tokio::test]
    async fn non_empty_error_object_keeps_previous_configuration() {
        let cfg = config();
        let mut transport = MockConfigTransport::new();
        transport.expect_fetch().returning(|_, _| {
            Err(FetchError::RemoteError("rate limited".to_string()))
        });

        let fetcher = Fetcher::with_transport(cfg.clone(), transport);
        fetcher.poll_once().await;
        assert!(cfg.rules().is_empty());
    }

    #[test]
    fn envelope_base64url_encodes_environment_tag() {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        let cfg = Arc::new(
            Config::builder(Some(key))
                .apply(vec![crate::config::environment_tag("staging")])
                .unwrap()
                .build()
                .unwrap(),
        );
        let fetcher = Fetcher::new(cfg);
        let envelope = fetcher.build_envelope();
        assert_eq!(envelope.app_environment, "c3RhZ2luZw");
        assert_eq!(envelope.application.environment, "c3RhZ2luZw");
    }
}
