//! The public facade: wires the dispatcher, DCR provider, fetcher, and
//! sender together and wraps a host's round-tripper, per spec.md §2/§5.

use std::sync::Arc;

use bearer_config::{Config, Fetcher, FetcherHandle, ReqwestConfigTransport};

use crate::dcr_provider::DcrProvider;
use crate::dispatcher::{Dispatcher, Listener};
use crate::interceptor::Interceptor;
use crate::round_tripper::{ReqwestRoundTripper, RoundTripper};
use crate::sender::{spawn as spawn_sender, ReqwestReportTransport, SenderHandle};

/// Owns the agent's background tasks (config fetcher, report sender) and
/// produces decorated round-trippers.
pub struct Agent {
    config: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
    fetcher: Option<FetcherHandle>,
    sender: Arc<SenderHandle>,
}

impl Agent {
    /// Builds an agent from environment-derived configuration (spec.md §6),
    /// registers the hard-wired DCR provider on every stage topic, and
    /// starts the background config fetcher.
    pub fn new() -> Self {
        Self::with_config(Config::from_env())
    }

    pub fn with_config(config: Config) -> Self {
        let config = Arc::new(config);

        let mut dispatcher = Dispatcher::new();
        let dcr_provider: Arc<dyn Listener> = Arc::new(DcrProvider::new(config.clone()));
        for topic in [
            bearer_protocol::event::Topic::Connect,
            bearer_protocol::event::Topic::Request,
            bearer_protocol::event::Topic::Response,
        ] {
            dispatcher.add_providers(topic, [dcr_provider.clone()]);
        }
        let dispatcher = Arc::new(dispatcher);

        let fetcher = if config.is_disabled() {
            None
        } else {
            Some(Fetcher::<ReqwestConfigTransport>::new(config.clone()).spawn())
        };

        let sender = Arc::new(spawn_sender(config.clone(), ReqwestReportTransport::new(config.clone())));

        Self {
            config,
            dispatcher,
            fetcher,
            sender,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Wraps `inner` with the five-stage interception pipeline. The
    /// returned client is itself a [`RoundTripper`], so it composes with
    /// further decorators or is used directly.
    pub fn wrap<R: RoundTripper>(&self, inner: R) -> Interceptor<R> {
        Interceptor::new(inner, self.dispatcher.clone(), self.config.clone(), self.sender.clone())
    }

    /// Wraps a default `reqwest`-backed round-tripper.
    pub fn wrap_reqwest(&self) -> Interceptor<ReqwestRoundTripper> {
        self.wrap(ReqwestRoundTripper::default())
    }

    /// Stops the background fetcher and drains the sender, awaiting all
    /// in-flight and lost-report POSTs before returning.
    pub async fn close(self) {
        if let Some(fetcher) = self.fetcher {
            fetcher.stop().await;
        }
        if let Ok(sender) = Arc::try_unwrap(self.sender) {
            sender.close().await;
        }
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearer_config::SecretKey;

    #[tokio::test]
    async fn wrapping_and_closing_a_disabled_agent_does_not_panic() {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        let config = Config::builder(Some(key))
            .apply(vec![bearer_config::disabled(true)])
            .unwrap()
            .build()
            .unwrap();

        let agent = Agent::with_config(config);
        let client = agent.wrap_reqwest();
        drop(client);
        agent.close().await;
    }
}
