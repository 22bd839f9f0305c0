//! Runtime layer for hasura-hooks applications.
//!
//! This crate provides:
//! - Layered configuration (`HasuraConfig`, `ConfigLoader`)
//! - Logging setup from the `[logging]` section
//! - Startup wiring (`HasuraRuntime`): load config, discover handlers,
//!   build the handler tables, serve
//!
//! # Transport
//!
//! With the `http-server` feature the runtime can serve the webhook
//! endpoints itself:
//!
//! ```ignore
//! use hasura_hooks_runtime::HasuraRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     HasuraRuntime::discover()?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Without it, take the [`HasuraService`](hasura_hooks_framework::HasuraService)
//! from [`HasuraRuntime::service`] and mount it in an existing server.

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, HasuraConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
#[cfg(feature = "http-server")]
pub use runtime::wait_for_shutdown;
pub use runtime::{HasuraRuntime, RuntimeBuilder};

// Re-export tracing for use by handler crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
