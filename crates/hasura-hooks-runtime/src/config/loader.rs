//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `hasura-hooks.toml`
//! - `yaml-config`: enables `hasura-hooks.yaml` / `hasura-hooks.yml`
//!
//! Both can be enabled at once; every format found is merged.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Main config file (`hasura-hooks.toml` / `hasura-hooks.yaml`)
//! 3. Profile-specific config file (`hasura-hooks.{profile}.toml`)
//! 4. Environment variables (`HASURA_HOOKS_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `HASURA_HOOKS_` prefix with `__` as the
//! nesting separator:
//!
//! - `HASURA_HOOKS_ENABLE_EVENT_LOGS=true` → `enable_event_logs = true`
//! - `HASURA_HOOKS_SERVER__PORT=8080` → `server.port = 8080`
//! - `HASURA_HOOKS_WEBHOOK__SECRET=xxx` → `webhook.secret = "xxx"`
//!
//! `HASURA_HOOKS_PROFILE` selects the profile and is not a config key.
//!
//! # Example
//!
//! ```rust,ignore
//! use hasura_hooks_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .set("enable_event_logs", true)
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::providers::{Env, Serialized};
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::{Figment, Provider};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HasuraConfig;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "HASURA_HOOKS_";

/// Environment variable selecting the configuration profile.
pub const PROFILE_ENV: &str = "HASURA_HOOKS_PROFILE";

/// Base name of configuration files.
pub const FILE_STEM: &str = "hasura-hooks";

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Option<String>,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the default locations and reads the
    /// environment.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: std::env::var(PROFILE_ENV)
                .ok()
                .filter(|profile| !profile.is_empty()),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Adds a search path for configuration files.
    ///
    /// Without explicit search paths, the current directory and the user
    /// config directory (`~/.config/hasura-hooks` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a provider on top of every other source.
    pub fn merge(mut self, provider: impl Provider) -> Self {
        self.overrides = self.overrides.merge(provider);
        self
    }

    /// Overrides a single (possibly dotted) key.
    pub fn set<T: Serialize>(self, key: &str, value: T) -> Self {
        self.merge(Serialized::default(key, value))
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<HasuraConfig> {
        let profile = self.profile.clone();
        let config: HasuraConfig = self.figment()?.extract()?;

        debug!(
            profile = profile.as_deref().unwrap_or("none"),
            prefix = %config.controller_prefix,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Builds the merged figment without extracting it.
    pub fn figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(HasuraConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(FILE_STEM));
        }
        paths
    }

    /// Merges the first directory's base file and its profile variant for
    /// every enabled format.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let mut found = false;

        for dir in self.resolve_search_paths() {
            for ext in enabled_extensions() {
                let base = dir.join(format!("{FILE_STEM}.{ext}"));
                if !base.exists() {
                    continue;
                }
                info!(path = %base.display(), "Loading configuration file");
                figment = merge_known_format(figment, &base, ext);
                found = true;

                if let Some(profile) = &self.profile {
                    let profiled = dir.join(format!("{FILE_STEM}.{profile}.{ext}"));
                    if profiled.exists() {
                        debug!(path = %profiled.display(), "Loading profile configuration file");
                        figment = merge_known_format(figment, &profiled, ext);
                    }
                }
            }
            if found {
                break;
            }
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

fn enabled_extensions() -> &'static [&'static str] {
    &[
        #[cfg(feature = "toml-config")]
        "toml",
        #[cfg(feature = "yaml-config")]
        "yaml",
        #[cfg(feature = "yaml-config")]
        "yml",
    ]
}

/// Merges a file whose extension is one of [`enabled_extensions`].
#[allow(unused_variables)]
fn merge_known_format(figment: Figment, path: &Path, ext: &str) -> Figment {
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => figment.merge(Toml::file(path)),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        _ => figment,
    }
}

/// Merges an explicitly named file, rejecting formats that are disabled.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if enabled_extensions().contains(&ext) {
        Ok(merge_known_format(figment, path, ext))
    } else {
        Err(ConfigError::UnsupportedFormat(ext.to_string()))
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<HasuraConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<HasuraConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;
    use hasura_hooks_framework::DuplicateActionPolicy;

    fn load_in(jail: &Jail, loader: ConfigLoader) -> figment::error::Result<HasuraConfig> {
        loader
            .search_path(jail.directory())
            .load()
            .map_err(|err| err.to_string().into())
    }

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = load_in(jail, ConfigLoader::new().without_env())?;
            assert_eq!(config, HasuraConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("HASURA_HOOKS_CONTROLLER_PREFIX", "hooks");
            jail.set_env("HASURA_HOOKS_ENABLE_EVENT_LOGS", "true");
            jail.set_env("HASURA_HOOKS_SERVER__PORT", "8081");
            jail.set_env("HASURA_HOOKS_PROFILE", "staging");

            let config = load_in(jail, ConfigLoader::new())?;
            assert_eq!(config.controller_prefix, "hooks");
            assert!(config.enable_event_logs);
            assert_eq!(config.server.port, 8081);
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_override_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("HASURA_HOOKS_ENABLE_EVENT_LOGS", "true");
            let config = load_in(jail, ConfigLoader::new().set("enable_event_logs", false))?;
            assert!(!config.enable_event_logs);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/hasura-hooks.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("hooks.ini", "prefix = x")?;
            let err = ConfigLoader::new().file("hooks.ini").load().unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_and_profile() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "hasura-hooks.toml",
                r#"
                    controller_prefix = "webhooks"
                    duplicate_actions = "reject"

                    [webhook]
                    secret_env = "TODO_HOOK_SECRET"

                    [logging]
                    level = "warn"
                "#,
            )?;
            jail.create_file(
                "hasura-hooks.production.toml",
                r#"
                    [logging]
                    level = "error"
                "#,
            )?;

            let config = load_in(jail, ConfigLoader::new().without_env())?;
            assert_eq!(config.controller_prefix, "webhooks");
            assert_eq!(config.duplicate_actions, DuplicateActionPolicy::Reject);
            assert_eq!(config.webhook.secret_env.as_deref(), Some("TODO_HOOK_SECRET"));
            assert_eq!(config.logging.level, LogLevel::Warn);

            let config = load_in(jail, ConfigLoader::new().without_env().profile("production"))?;
            assert_eq!(config.logging.level, LogLevel::Error);
            assert_eq!(config.controller_prefix, "webhooks");
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_value_is_extract_error() {
        Jail::expect_with(|jail| {
            jail.create_file("hasura-hooks.toml", r#"duplicate_actions = "first-wins""#)?;
            let err = ConfigLoader::new()
                .without_env()
                .search_path(jail.directory())
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::Extract(_)));
            Ok(())
        });
    }
}
