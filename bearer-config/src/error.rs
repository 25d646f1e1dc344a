use thiserror::Error;

/// Construction-time configuration errors, per spec.md §7 "Configuration"
/// taxonomy: fatal, raised directly from the builder.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("secret key must match ^app_[0-9a-fA-F]{{50}}$")]
    InvalidSecretKey,

    #[error("invalid sensitive-data pattern `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: fancy_regex::Error,
    },

    #[error("invalid endpoint URL `{0}`")]
    InvalidEndpoint(String),
}

/// Remote-fetch errors, per spec.md §7 "Remote-fetch" taxonomy: always
/// recovered locally (logged at WARN, previous config retained).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("config endpoint returned status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("could not parse config response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config endpoint reported an error: {0}")]
    RemoteError(String),
}
