//! Configuration validation.

use http::HeaderName;

use super::error::{ConfigError, ConfigResult};
use super::schema::{HasuraConfig, LogOutput, LoggingConfig, ServerConfig, WebhookConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HasuraConfig) -> ConfigResult<()> {
    validate_prefix(&config.controller_prefix)?;
    validate_webhook(&config.webhook)?;
    validate_server(&config.server)?;
    validate_logging(&config.logging)?;

    if config.log_payloads && !config.enable_event_logs {
        tracing::warn!("`log_payloads` has no effect unless `enable_event_logs` is set");
    }
    Ok(())
}

/// The prefix becomes a single path segment: `/{prefix}/events`.
fn validate_prefix(prefix: &str) -> ConfigResult<()> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::validation("controller_prefix must not be empty"));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '?' | '#')) {
        return Err(ConfigError::validation(format!(
            "controller_prefix `{prefix}` contains characters not allowed in a path"
        )));
    }
    Ok(())
}

fn validate_webhook(webhook: &WebhookConfig) -> ConfigResult<()> {
    if HeaderName::from_bytes(webhook.secret_header.as_bytes()).is_err() {
        return Err(ConfigError::validation(format!(
            "webhook.secret_header `{}` is not a valid header name",
            webhook.secret_header
        )));
    }
    if webhook.secret.is_some() && webhook.secret_env.is_some() {
        return Err(ConfigError::validation(
            "Set only one of webhook.secret and webhook.secret_env",
        ));
    }
    if webhook.secret.as_deref() == Some("") {
        return Err(ConfigError::validation("webhook.secret must not be empty"));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.is_empty() {
        return Err(ConfigError::validation("server.host must not be empty"));
    }
    if server.port == 0 {
        return Err(ConfigError::validation("server.port must be greater than 0"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is `file`",
        ));
    }
    for module in logging.filters.keys() {
        if module.is_empty() || module.contains(&['=', ',', ' '][..]) {
            return Err(ConfigError::validation(format!(
                "Invalid module in logging.filters: `{module}`"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&HasuraConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_prefix() {
        let mut config = HasuraConfig::default();
        config.controller_prefix = "/".into();
        assert!(validate_config(&config).is_err());

        config.controller_prefix = "/hooks/".into();
        assert!(validate_config(&config).is_ok());

        config.controller_prefix = "my hooks".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_secret_header() {
        let mut config = HasuraConfig::default();
        config.webhook.secret_header = "bad header\n".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_conflicting_secrets() {
        let mut config = HasuraConfig::default();
        config.webhook.secret = Some("s3cret".into());
        config.webhook.secret_env = Some("HOOK_SECRET".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = HasuraConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("logs/hooks.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
