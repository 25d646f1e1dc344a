use thiserror::Error;

/// Errors raised while constructing or reconfiguring a [`crate::filter::Filter`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("matcher type is incompatible with this filter, default matcher retained")]
    IncompatibleMatcher,

    #[error("filter does not accept a matcher")]
    MatcherUnsupported,
}

/// Errors raised while resolving a [`crate::filter::FilterDescription`] graph
/// into concrete [`crate::filter::Filter`]s, per spec.md §4.3.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("undefined hashes referenced: {0}")]
    UndefinedHashes(String),

    #[error("circular hash dependency: {0} <-> {1}")]
    Circular(String, String),
}
