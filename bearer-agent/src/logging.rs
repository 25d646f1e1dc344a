//! An optional, opt-in `tracing-subscriber` initializer for hosts that want
//! the agent's own spans/events on stderr without wiring their own
//! subscriber, per spec.md §9 "Global logger" and SPEC_FULL.md §10.1.
//!
//! Gated behind the `subscriber` feature; never called automatically —
//! [`Agent::new`](crate::Agent::new) never installs a global subscriber on
//! its own, since doing so from a library would fight whatever subscriber
//! the host process already runs.

use tracing_subscriber::EnvFilter;

/// Installs a JSON-formatted subscriber reading `RUST_LOG` (defaulting to
/// `info` for this crate's events), returning `Err` if a global subscriber
/// is already installed.
pub fn init() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bearer_agent=info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).json().finish();
    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic() {
        let _ = init();
    }
}
