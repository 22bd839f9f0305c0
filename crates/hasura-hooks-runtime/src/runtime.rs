//! Process wiring: configuration, logging, handler discovery and serving.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hasura_hooks_runtime::HasuraRuntime;
//!
//! // Loads hasura-hooks.toml, installs logging, collects every
//! // #[event_handler] / #[action_handler] in the binary.
//! let runtime = HasuraRuntime::discover()?;
//! runtime.run().await?;
//!
//! // Custom configuration path
//! let runtime = HasuraRuntime::builder()
//!     .config_file("config/hooks.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::path::PathBuf;

use tracing::info;

use hasura_hooks_core::{HandlerSource, LinkedHandlers};
use hasura_hooks_framework::HasuraService;

use crate::config::{ConfigLoader, HasuraConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A validated configuration together with the service built from it.
///
/// Building the runtime is the startup check: any handler registration
/// problem surfaces here, before a listener is bound.
#[derive(Debug, Clone)]
pub struct HasuraRuntime {
    config: HasuraConfig,
    service: HasuraService,
}

impl HasuraRuntime {
    /// Loads configuration from the default locations, installs logging and
    /// builds the service from the macro-registered handlers.
    pub fn discover() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config` and builds the service from `source`.
    ///
    /// Logging is left untouched.
    pub fn from_config<S: HandlerSource + ?Sized>(
        config: HasuraConfig,
        source: &S,
    ) -> RuntimeResult<Self> {
        validate_config(&config)?;
        let service = HasuraService::build(source, config.service_options())?;

        info!(
            prefix = %config.controller_prefix,
            duplicate_actions = ?config.duplicate_actions,
            event_logs = config.enable_event_logs,
            "Runtime initialized from configuration"
        );
        Ok(Self { config, service })
    }

    pub fn config(&self) -> &HasuraConfig {
        &self.config
    }

    /// The service, for mounting into an application's own server.
    pub fn service(&self) -> &HasuraService {
        &self.service
    }

    pub fn into_service(self) -> HasuraService {
        self.service
    }
}

#[cfg(feature = "http-server")]
impl HasuraRuntime {
    /// Serves the webhook endpoints until Ctrl+C or SIGTERM.
    pub async fn run(self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Serves the webhook endpoints until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        use hasura_hooks_transport::{RouterOptions, router, serve};
        use tokio::net::TcpListener;

        let options = RouterOptions {
            prefix: self.config.controller_prefix.clone(),
            secret_header: self.config.webhook.secret_header.clone(),
            secret: self.config.webhook.resolve_secret()?,
        };
        let router = router(self.service, options)?;

        let addr = self.config.server.addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(addr = %addr, "Hasura webhook server starting");

        serve(listener, router, shutdown).await?;
        Ok(())
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
#[cfg(feature = "http-server")]
pub async fn wait_for_shutdown() {
    use tracing::warn;

    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Builder for [`HasuraRuntime`].
#[derive(Debug)]
pub struct RuntimeBuilder {
    config_file: Option<PathBuf>,
    profile: Option<String>,
    config: Option<HasuraConfig>,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_file: None,
            profile: None,
            config: None,
            init_logging: true,
        }
    }

    /// Loads exactly this configuration file instead of searching.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Uses a preloaded configuration; file and profile settings are ignored.
    pub fn config(mut self, config: HasuraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Whether to install the global subscriber from `[logging]`.
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    /// Builds the runtime from the macro-registered handlers.
    pub fn build(self) -> RuntimeResult<HasuraRuntime> {
        self.build_with(&LinkedHandlers)
    }

    /// Builds the runtime from an explicit handler source.
    pub fn build_with<S: HandlerSource + ?Sized>(self, source: &S) -> RuntimeResult<HasuraRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let mut loader = ConfigLoader::new();
                if let Some(path) = self.config_file {
                    loader = loader.file(path);
                }
                if let Some(profile) = self.profile {
                    loader = loader.profile(profile);
                }
                loader.load()?
            }
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        HasuraRuntime::from_config(config, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use std::sync::Arc;

    use hasura_hooks_core::{BoxError, ConfigurationError, EventBindingConfig, EventPayload};
    use hasura_hooks_framework::{DuplicateActionPolicy, HandlerRegistry};
    use serde_json::{Value, json};

    fn registry() -> HandlerRegistry {
        HandlerRegistry::new()
            .on_trigger("todo_created", |_event| async {
                Ok::<_, BoxError>(json!("created"))
            })
            .action("complete_todo", |input: Value, _action, _headers| async move {
                Ok::<_, BoxError>(input)
            })
    }

    #[tokio::test]
    async fn test_runtime_from_config() {
        let runtime = HasuraRuntime::from_config(HasuraConfig::default(), &registry()).unwrap();
        assert_eq!(runtime.config().controller_prefix, "hasura");

        let result = runtime
            .service()
            .handle_action(
                json!({ "action": { "name": "complete_todo" }, "input": { "id": 1 } }),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(result, json!({ "id": 1 }));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = HasuraConfig {
            controller_prefix: "/".into(),
            ..Default::default()
        };
        let err = HasuraRuntime::from_config(config, &registry()).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_registration_errors_stop_startup() {
        let registry = registry().event(
            "Broken",
            "handle",
            EventBindingConfig::EMPTY,
            |_event: Arc<EventPayload>| async { Ok::<_, BoxError>(Value::Null) },
        );
        let err = HasuraRuntime::from_config(HasuraConfig::default(), &registry).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Configuration(ConfigurationError::MissingBinding { .. })
        ));
    }

    #[test]
    fn test_duplicate_policy_from_config() {
        let registry = registry().action("complete_todo", |_input, _action, _headers| async {
            Ok::<_, BoxError>(Value::Null)
        });

        assert!(HasuraRuntime::from_config(HasuraConfig::default(), &registry).is_ok());

        let config = HasuraConfig {
            duplicate_actions: DuplicateActionPolicy::Reject,
            ..Default::default()
        };
        let err = HasuraRuntime::from_config(config, &registry).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Configuration(ConfigurationError::DuplicateAction { .. })
        ));
    }

    #[test]
    fn test_builder_with_preloaded_config() {
        let config = HasuraConfig {
            controller_prefix: "hooks".into(),
            ..Default::default()
        };
        let runtime = HasuraRuntime::builder()
            .config(config)
            .init_logging(false)
            .build_with(&registry())
            .unwrap();
        assert_eq!(runtime.config().controller_prefix, "hooks");
        assert_eq!(runtime.service().events().table().len(), 1);
    }
}
