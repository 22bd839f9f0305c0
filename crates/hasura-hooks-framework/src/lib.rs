//! # hasura-hooks framework
//!
//! Turns discovered handlers into something that can serve requests:
//!
//! - Handler tables built once at startup ([`table`])
//! - The event dispatcher with concurrent fan-out ([`dispatcher`])
//! - The single-handler action dispatcher ([`action`])
//! - Closure-based registration for tests and explicit setups ([`registry`])
//! - [`HasuraService`], the boundary the HTTP layer calls into
//!
//! ```rust,ignore
//! use hasura_hooks_framework::{HasuraService, ServiceOptions};
//! use hasura_hooks_core::LinkedHandlers;
//!
//! let service = HasuraService::build(&LinkedHandlers, ServiceOptions::default())?;
//! let results = service.handle_event(body).await?;
//! ```

pub mod action;
pub mod dispatcher;
pub mod registry;
pub mod service;
pub mod table;

pub use action::{ActionDispatcher, ActionRequest};
pub use dispatcher::{DispatchOptions, EventDispatcher};
pub use registry::{HandlerRegistry, REGISTRY_OWNER};
pub use service::{HasuraService, ServiceOptions};
pub use table::{
    ActionHandlerTable, ActionRoute, DuplicateActionPolicy, EventHandlerTable, EventRoute,
    HandlerTable,
};
