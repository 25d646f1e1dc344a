//! Remote configuration fetch loop and filter/DCR resolution for the Bearer
//! instrumentation agent.
//!
//! Depends on [`bearer_protocol`] for the data model; consumed by
//! `bearer-agent` for the interception pipeline.

pub mod config;
pub mod defaults;
pub mod description;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod secret_key;

pub use config::{
    disabled, endpoints, environment_tag, in_flight_limit, logger, sensitive_keys, sensitive_regexps, Config,
    ConfigBuilder, ConfigOp,
};
pub use description::{Description, DescriptionError};
pub use error::{ConfigError, FetchError};
pub use fetcher::{ConfigTransport, Fetcher, FetcherHandle, ReqwestConfigTransport};
pub use secret_key::SecretKey;
