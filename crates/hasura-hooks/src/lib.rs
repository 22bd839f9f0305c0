//! # hasura-hooks
//!
//! Attribute-routed webhooks for Hasura event triggers, cron triggers,
//! scheduled events and actions.
//!
//! ## Overview
//!
//! Handlers are plain async functions. `#[event_handler]` binds one to a
//! trigger name and/or a table, `#[action_handler]` binds one to an action
//! name. At startup every annotated handler linked into the binary is
//! collected into routing tables; each incoming request is classified and
//! fanned out to the matching handlers.
//!
//! ```text
//! ┌──────────┐  POST /{prefix}/events   ┌────────────┐     ┌─────────────────┐
//! │          │─────────────────────────▶│ classify   │────▶│ EventDispatcher │──▶ handlers (concurrent)
//! │  Hasura  │                          └────────────┘     └─────────────────┘
//! │          │  POST /{prefix}/actions                     ┌──────────────────┐
//! │          │────────────────────────────────────────────▶│ ActionDispatcher │──▶ one handler
//! └──────────┘                                             └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hasura_hooks::prelude::*;
//!
//! #[event_handler(trigger = "todo_created")]
//! async fn todo_created(event: TableEvent) -> anyhow::Result<()> {
//!     info!(id = %event.id, "New todo");
//!     Ok(())
//! }
//!
//! #[action_handler(name = "complete_todo")]
//! async fn complete_todo(input: CompleteTodo) -> anyhow::Result<Todo> {
//!     todos::complete(input.id).await
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     HasuraRuntime::discover()?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: `hasura-hooks.toml` configuration files
//! - `yaml-config`: `hasura-hooks.yaml` configuration files
//! - `json-log`: JSON log output
//! - `http-server`: built-in axum server (`HasuraRuntime::run`)

pub use hasura_hooks_core as core;
pub use hasura_hooks_framework as framework;
pub use hasura_hooks_runtime as runtime;
pub use hasura_hooks_transport as transport;

pub use hasura_hooks_macros::{action_handler, event_handler};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hasura_hooks::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hasura_hooks_runtime::{HasuraConfig, HasuraRuntime};

    // Handler registration
    pub use hasura_hooks_framework::{HandlerRegistry, HasuraService};
    pub use hasura_hooks_macros::{action_handler, event_handler};

    // Handler arguments
    pub use hasura_hooks_core::http::HeaderMap;
    pub use hasura_hooks_core::{
        ActionPayload, EventOp, EventPayload, ScheduledEvent, SessionVariables, TableEvent,
    };
    pub use std::sync::Arc;

    // Logging
    pub use hasura_hooks_runtime::prelude::*;
}

/// Items referenced by macro-generated code. Not public API.
#[doc(hidden)]
pub mod __private {
    pub use hasura_hooks_core::linkme;
    pub use hasura_hooks_core::{
        ACTION_HANDLERS, ActionHandlerEntry, EVENT_HANDLERS, EventBindingConfig,
        EventHandlerEntry, TableRef, call_action_fn, call_event_fn,
    };
}
