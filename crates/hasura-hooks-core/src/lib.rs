//! # hasura-hooks core
//!
//! Building blocks for routing Hasura webhooks to application handlers:
//!
//! - **Payloads** ([`payload`]): typed table events, scheduled events and
//!   action invocations
//! - **Routing** ([`routing`]): routing keys and event handler bindings
//! - **Classification** ([`classify`]): shape-based decoding of event bodies
//! - **Handlers** ([`handler`]): erased handler traits and the calling
//!   conventions used by the attribute macros
//! - **Discovery** ([`discovery`]): the link-time handler registry
//!
//! ```text
//! #[event_handler] ──▶ EVENT_HANDLERS ──▶ HandlerSource ──▶ handler tables
//!                                                              │
//! raw JSON ──▶ classify ──▶ ClassifiedEvent { keys } ──────────┘──▶ handlers
//! ```

pub mod classify;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod payload;
pub mod routing;

pub use classify::{ClassifiedEvent, classify};
pub use discovery::{
    ACTION_HANDLERS, ActionHandlerEntry, ActionInvokeFn, DiscoveredActionHandler,
    DiscoveredEventHandler, EVENT_HANDLERS, EventHandlerEntry, EventInvokeFn, HandlerSource,
    LinkedHandlers,
};
pub use error::{
    BoxError, ClassificationError, ConfigurationError, DispatchError, DispatchResult,
    ExtractError, HandlerNotFoundError,
};
pub use handler::{
    ActionFn, ActionHandler, BoxFuture, BoxedActionHandler, BoxedEventHandler, EventHandler,
    FromPayload, HandlerResult, IntoHandlerResult, call_action_fn, call_event_fn,
};
pub use payload::{
    ActionName, ActionPayload, DeliveryInfo, EventBody, EventKind, EventOp, EventPayload,
    RowData, ScheduledEvent, SessionVariables, TableEvent, TableName, TriggerRef,
};
pub use routing::{DEFAULT_SCHEMA, EventBindingConfig, RoutingKey, TableRef};

pub use http;
#[doc(hidden)]
pub use linkme;
