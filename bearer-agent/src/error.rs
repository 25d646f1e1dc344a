use thiserror::Error;

/// Errors raised while a call traverses the interception pipeline, per
/// spec.md §7 "Stage" / "Transport" taxonomy.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("invalid connect target `{0}`: {1}")]
    InvalidConnectTarget(String, &'static str),

    #[error("listener aborted dispatch: {0}")]
    ListenerAborted(String),

    #[error("dispatch cancelled")]
    Cancelled,
}

/// Errors from the wrapped round-tripper. The agent never maps these onto
/// its own error types when returning control to the host (spec.md §7
/// "Propagation") — this exists only for the agent's own bookkeeping.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors from the async report sender's channel plumbing.
#[derive(Error, Debug)]
pub enum SenderError {
    #[error("report channel closed")]
    FanInClosed,
}
