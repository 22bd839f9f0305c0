//! Handler discovery.
//!
//! The `#[event_handler]` and `#[action_handler]` attribute macros leave the
//! annotated function untouched and append a static entry to the
//! [`EVENT_HANDLERS`] or [`ACTION_HANDLERS`] distributed slice. The linker
//! gathers entries from every crate in the final binary, so
//! [`LinkedHandlers`] sees all annotated handlers no matter where, or in
//! which order, they were declared.
//!
//! Table builders consume handlers through the [`HandlerSource`] trait,
//! which lets tests and applications supply handlers without the macros.

use std::sync::Arc;

use http::HeaderMap;
use linkme::distributed_slice;
use serde_json::Value;
use tracing::debug;

use crate::handler::{BoxFuture, BoxedActionHandler, BoxedEventHandler, HandlerResult};
use crate::payload::{ActionPayload, EventPayload};
use crate::routing::EventBindingConfig;

/// Function pointer generated for an annotated event handler.
pub type EventInvokeFn = fn(Arc<EventPayload>) -> BoxFuture<'static, HandlerResult>;

/// Function pointer generated for an annotated action handler.
pub type ActionInvokeFn =
    fn(Value, Arc<ActionPayload>, Arc<HeaderMap>) -> BoxFuture<'static, HandlerResult>;

/// Registry entry emitted by `#[event_handler]`.
pub struct EventHandlerEntry {
    /// `module_path!()` of the declaring module.
    pub owner: &'static str,
    pub method: &'static str,
    pub binding: EventBindingConfig,
    pub invoke: EventInvokeFn,
}

/// Registry entry emitted by `#[action_handler]`.
pub struct ActionHandlerEntry {
    pub owner: &'static str,
    pub method: &'static str,
    pub name: &'static str,
    pub invoke: ActionInvokeFn,
}

/// Every annotated event handler linked into the binary.
#[distributed_slice]
pub static EVENT_HANDLERS: [EventHandlerEntry];

/// Every annotated action handler linked into the binary.
#[distributed_slice]
pub static ACTION_HANDLERS: [ActionHandlerEntry];

/// A discovered event handler with its binding metadata.
#[derive(Clone)]
pub struct DiscoveredEventHandler {
    pub owner: String,
    pub method: String,
    pub config: EventBindingConfig,
    pub handler: BoxedEventHandler,
}

/// A discovered action handler with the action name it serves.
#[derive(Clone)]
pub struct DiscoveredActionHandler {
    pub owner: String,
    pub method: String,
    pub name: String,
    pub handler: BoxedActionHandler,
}

impl std::fmt::Debug for DiscoveredEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredEventHandler")
            .field("owner", &self.owner)
            .field("method", &self.method)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DiscoveredActionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredActionHandler")
            .field("owner", &self.owner)
            .field("method", &self.method)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A read-only query over the handlers an application declares.
///
/// Queried once at startup. An empty result is not an error.
pub trait HandlerSource {
    fn event_handlers(&self) -> Vec<DiscoveredEventHandler>;

    fn action_handlers(&self) -> Vec<DiscoveredActionHandler>;
}

/// Handlers registered through the attribute macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedHandlers;

impl HandlerSource for LinkedHandlers {
    fn event_handlers(&self) -> Vec<DiscoveredEventHandler> {
        let handlers: Vec<_> = EVENT_HANDLERS
            .iter()
            .map(|entry| DiscoveredEventHandler {
                owner: entry.owner.to_string(),
                method: entry.method.to_string(),
                config: entry.binding.clone(),
                handler: Arc::new(entry.invoke),
            })
            .collect();
        debug!(count = handlers.len(), "Discovered linked event handlers");
        handlers
    }

    fn action_handlers(&self) -> Vec<DiscoveredActionHandler> {
        let handlers: Vec<_> = ACTION_HANDLERS
            .iter()
            .map(|entry| DiscoveredActionHandler {
                owner: entry.owner.to_string(),
                method: entry.method.to_string(),
                name: entry.name.to_string(),
                handler: Arc::new(entry.invoke),
            })
            .collect();
        debug!(count = handlers.len(), "Discovered linked action handlers");
        handlers
    }
}

impl<S: HandlerSource + ?Sized> HandlerSource for &S {
    fn event_handlers(&self) -> Vec<DiscoveredEventHandler> {
        (**self).event_handlers()
    }

    fn action_handlers(&self) -> Vec<DiscoveredActionHandler> {
        (**self).action_handlers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::call_event_fn;
    use crate::payload::TableEvent;
    use serde_json::json;

    async fn record_user(event: TableEvent) -> Value {
        json!(event.id)
    }

    #[distributed_slice(EVENT_HANDLERS)]
    static RECORD_USER: EventHandlerEntry = EventHandlerEntry {
        owner: module_path!(),
        method: "record_user",
        binding: EventBindingConfig::trigger("user_recorded"),
        invoke: |event| call_event_fn(record_user, event),
    };

    #[tokio::test]
    async fn test_linked_handlers_include_registered_entry() {
        let handlers = LinkedHandlers.event_handlers();
        let found = handlers
            .iter()
            .find(|handler| handler.method == "record_user")
            .unwrap();

        assert_eq!(found.owner, module_path!());
        assert_eq!(found.config, EventBindingConfig::trigger("user_recorded"));

        let event = crate::classify::classify(json!({
            "id": "evt-9",
            "trigger": { "name": "user_recorded" },
            "table": { "name": "users" }
        }))
        .unwrap();
        let result = found.handler.call(Arc::new(event.payload)).await.unwrap();
        assert_eq!(result, json!("evt-9"));
    }
}
