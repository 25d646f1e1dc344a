//! The event dispatcher, per spec.md §4.1.
//!
//! Providers register listeners against a [`Topic`]; a dispatch runs every
//! listener registered for that topic synchronously and sequentially in
//! registration order, with a cancellation check between each one.

use std::collections::HashMap;
use std::sync::Arc;

use bearer_protocol::event::{CallEvent, Topic};
use tokio_util::sync::CancellationToken;

use crate::error::StageError;

/// A single stage observer. Implementations mutate the event in place;
/// mutations are visible to listeners registered after them.
pub trait Listener: std::fmt::Debug + Send + Sync {
    fn on_event(&self, event: &mut CallEvent) -> Result<(), StageError>;
}

/// Holds no shared mutable state beyond its listener registry: the
/// dispatcher itself is safe to share across concurrent dispatches (spec.md
/// §4.1 "Scheduling").
#[derive(Default)]
pub struct Dispatcher {
    providers: HashMap<Topic, Vec<Arc<dyn Listener>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers listeners for a topic, appended after any already
    /// registered for it.
    pub fn add_providers(&mut self, topic: Topic, listeners: impl IntoIterator<Item = Arc<dyn Listener>>) {
        self.providers.entry(topic).or_default().extend(listeners);
    }

    /// Runs every listener registered for `topic`, aborting on the first
    /// error or on cancellation.
    pub fn dispatch(
        &self,
        topic: Topic,
        event: &mut CallEvent,
        cancel: &CancellationToken,
    ) -> Result<(), StageError> {
        event.topic = topic;
        let Some(listeners) = self.providers.get(&topic) else {
            return Ok(());
        };
        for listener in listeners {
            if cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            listener.on_event(event)?;
        }
        Ok(())
    }
}
