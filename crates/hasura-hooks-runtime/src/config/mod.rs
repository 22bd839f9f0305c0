//! Configuration for hasura-hooks applications.
//!
//! Layered figment loading (defaults, files, `HASURA_HOOKS_*` environment,
//! programmatic overrides) followed by validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    HasuraConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ServerConfig, SpanEventConfig,
    WebhookConfig,
};
pub use validation::validate_config;
