//! The DCR provider listener, registered against the connect/request/response
//! stage topics (not the report topic, which only runs the sanitizer and
//! proxy sender), per spec.md §4.5-§4.6.

use std::sync::Arc;

use bearer_config::Config;
use bearer_protocol::dcr::TriggeredRule;
use bearer_protocol::event::CallEvent;

use crate::dispatcher::Listener;
use crate::error::StageError;

#[derive(Debug)]
pub struct DcrProvider {
    config: Arc<Config>,
}

impl DcrProvider {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl Listener for DcrProvider {
    /// Re-evaluated at every connect/request/response stage, since a filter
    /// may only become satisfiable once later fields of `event` are filled
    /// in. A rule already present in `event.triggered` from an earlier stage
    /// is skipped so it contributes to the report at most once.
    fn on_event(&self, event: &mut CallEvent) -> Result<(), StageError> {
        for rule in self.config.rules() {
            if event.triggered.iter().any(|t| t.filter_hash == rule.filter_hash) {
                continue;
            }

            let triggered = match &rule.filter {
                Some(filter) => filter.matches_call(event),
                None => true,
            };
            if !triggered {
                continue;
            }

            event.triggered.push(TriggeredRule::from(&rule));
            // Last matching rule wins; this is a direct assignment, not a
            // monotonic raise (spec.md §9 open-question resolution).
            if let Some(log_level) = rule.log_level {
                event.config.log_level = log_level;
            }
            if let Some(is_active) = rule.is_active {
                event.config.is_active = is_active;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearer_config::SecretKey;
    use bearer_protocol::filter::{FilterKind, YesFilter};
    use bearer_protocol::log_level::LogLevel;
    use bearer_protocol::{DataCollectionRule, Filter};
    use serde_json::Value;
    use std::collections::HashMap;

    fn config() -> Arc<Config> {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        Arc::new(Config::builder(Some(key)).build().unwrap())
    }

    fn rule(filter_hash: &str, filter: Option<Arc<dyn Filter>>, log_level: Option<LogLevel>) -> DataCollectionRule {
        DataCollectionRule {
            filter_hash: filter_hash.to_string(),
            filter,
            log_level,
            is_active: None,
            params: Value::Null,
            signature: "sig".to_string(),
        }
    }

    #[test]
    fn no_filter_always_triggers() {
        let cfg = config();
        cfg.replace_resolved(HashMap::new(), vec![rule("h1", None, Some(LogLevel::All))]);

        let provider = DcrProvider::new(cfg);
        let mut event = CallEvent::new_connect();
        provider.on_event(&mut event).unwrap();

        assert_eq!(event.triggered.len(), 1);
        assert_eq!(event.config.log_level, LogLevel::All);
    }

    #[test]
    fn rule_does_not_retrigger_across_repeated_stage_evaluation() {
        let cfg = config();
        cfg.replace_resolved(HashMap::new(), vec![rule("h1", None, Some(LogLevel::All))]);

        let provider = DcrProvider::new(cfg);
        let mut event = CallEvent::new_connect();
        // Simulate the same event being dispatched through connect, request,
        // and response stage topics in turn.
        provider.on_event(&mut event).unwrap();
        provider.on_event(&mut event).unwrap();
        provider.on_event(&mut event).unwrap();

        assert_eq!(event.triggered.len(), 1);
    }

    #[test]
    fn later_rule_log_level_wins_over_earlier() {
        let cfg = config();
        let yes: Arc<dyn Filter> = Arc::new(YesFilter);
        assert_eq!(yes.kind(), FilterKind::Yes);
        cfg.replace_resolved(
            HashMap::new(),
            vec![
                rule("h1", Some(yes.clone()), Some(LogLevel::All)),
                rule("h2", Some(yes), Some(LogLevel::Detected)),
            ],
        );

        let provider = DcrProvider::new(cfg);
        let mut event = CallEvent::new_connect();
        provider.on_event(&mut event).unwrap();

        assert_eq!(event.triggered.len(), 2);
        assert_eq!(event.config.log_level, LogLevel::Detected);
    }
}
