//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use hasura_hooks_framework::{DispatchOptions, DuplicateActionPolicy, ServiceOptions};

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasuraConfig {
    /// HTTP path prefix of the webhook endpoints.
    #[serde(default = "default_controller_prefix")]
    pub controller_prefix: String,

    /// Log every received event with its candidate routing keys.
    #[serde(default)]
    pub enable_event_logs: bool,

    /// Include full event bodies in event logs.
    #[serde(default)]
    pub log_payloads: bool,

    /// What to do when two handlers claim the same action name.
    #[serde(default)]
    pub duplicate_actions: DuplicateActionPolicy,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for HasuraConfig {
    fn default() -> Self {
        Self {
            controller_prefix: default_controller_prefix(),
            enable_event_logs: false,
            log_payloads: false,
            duplicate_actions: DuplicateActionPolicy::default(),
            webhook: WebhookConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HasuraConfig {
    /// Options used to build the handler tables and dispatchers.
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            dispatch: DispatchOptions {
                enable_event_logs: self.enable_event_logs,
                log_payloads: self.log_payloads,
            },
            duplicate_actions: self.duplicate_actions,
        }
    }
}

fn default_controller_prefix() -> String {
    "hasura".to_string()
}

/// Webhook authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Header carrying the shared secret.
    #[serde(default = "default_secret_header")]
    pub secret_header: String,

    /// Shared secret configured on the Hasura side.
    #[serde(default)]
    pub secret: Option<String>,

    /// Environment variable to read the shared secret from.
    #[serde(default)]
    pub secret_env: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret_header: default_secret_header(),
            secret: None,
            secret_env: None,
        }
    }
}

impl WebhookConfig {
    /// Returns the effective secret, reading `secret_env` if needed.
    ///
    /// `None` means requests are accepted without a secret header.
    pub fn resolve_secret(&self) -> ConfigResult<Option<String>> {
        if let Some(secret) = &self.secret {
            return Ok(Some(secret.clone()));
        }
        match &self.secret_env {
            Some(name) => std::env::var(name)
                .map(Some)
                .map_err(|_| ConfigError::env_var(name)),
            None => Ok(None),
        }
    }
}

fn default_secret_header() -> String {
    "x-hasura-webhook-secret".to_string()
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port`, suitable for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module level overrides, e.g. `hasura_hooks_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Needs the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = HasuraConfig::default();
        assert_eq!(config.controller_prefix, "hasura");
        assert!(!config.enable_event_logs);
        assert_eq!(config.webhook.secret_header, "x-hasura-webhook-secret");
        assert_eq!(config.server.addr(), "0.0.0.0:3000");
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.duplicate_actions, DuplicateActionPolicy::LastWins);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: HasuraConfig = serde_json::from_value(json!({
            "enable_event_logs": true,
            "duplicate_actions": "reject",
            "logging": { "level": "debug", "filters": { "hyper": "warn" } }
        }))
        .unwrap();

        assert_eq!(config.controller_prefix, "hasura");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["hyper"], LogLevel::Warn);

        let options = config.service_options();
        assert!(options.dispatch.enable_event_logs);
        assert!(!options.dispatch.log_payloads);
        assert_eq!(options.duplicate_actions, DuplicateActionPolicy::Reject);
    }

    #[test]
    fn test_resolve_secret_prefers_inline_value() {
        let webhook = WebhookConfig {
            secret: Some("inline".into()),
            secret_env: Some("HASURA_HOOKS_TEST_UNSET_SECRET".into()),
            ..Default::default()
        };
        assert_eq!(webhook.resolve_secret().unwrap().as_deref(), Some("inline"));

        let missing = WebhookConfig {
            secret_env: Some("HASURA_HOOKS_TEST_UNSET_SECRET".into()),
            ..Default::default()
        };
        assert!(matches!(
            missing.resolve_secret(),
            Err(ConfigError::EnvVar { .. })
        ));

        assert_eq!(WebhookConfig::default().resolve_secret().unwrap(), None);
    }
}
