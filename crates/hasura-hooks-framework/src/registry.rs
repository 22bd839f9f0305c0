//! Programmatic handler registration.
//!
//! [`HandlerRegistry`] is a [`HandlerSource`] built from closures instead of
//! attribute macros. Applications can mix both styles with
//! [`HandlerRegistry::extend_from`]:
//!
//! ```rust,ignore
//! let registry = HandlerRegistry::new()
//!     .extend_from(&LinkedHandlers)
//!     .on_trigger("audit_log", |event| async move { audit(event).await });
//! ```

use std::future::Future;
use std::sync::Arc;

use http::HeaderMap;
use serde_json::Value;

use hasura_hooks_core::{
    ActionHandler, ActionPayload, DiscoveredActionHandler, DiscoveredEventHandler,
    EventBindingConfig, EventHandler, EventPayload, HandlerResult, HandlerSource, TableRef,
};

/// Owner recorded for handlers registered without an explicit owner.
pub const REGISTRY_OWNER: &str = "registry";

/// An in-memory [`HandlerSource`].
///
/// Handlers are reported in registration order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    events: Vec<DiscoveredEventHandler>,
    actions: Vec<DiscoveredActionHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event handler with full metadata.
    pub fn event<H>(
        mut self,
        owner: impl Into<String>,
        method: impl Into<String>,
        config: EventBindingConfig,
        handler: H,
    ) -> Self
    where
        H: EventHandler + 'static,
    {
        self.events.push(DiscoveredEventHandler {
            owner: owner.into(),
            method: method.into(),
            config,
            handler: Arc::new(handler),
        });
        self
    }

    /// Registers an event handler for an event or cron trigger.
    pub fn on_trigger<F, Fut>(self, trigger: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<EventPayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let trigger = trigger.into();
        let config = EventBindingConfig::default().with_trigger(trigger.clone());
        self.event(REGISTRY_OWNER, trigger, config, handler)
    }

    /// Registers an event handler for every trigger on a table.
    pub fn on_table<F, Fut>(self, schema: Option<&str>, table: &str, handler: F) -> Self
    where
        F: Fn(Arc<EventPayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let table = TableRef::from_parts(schema.map(str::to_string), table);
        let method = table.to_string();
        self.event(
            REGISTRY_OWNER,
            method,
            EventBindingConfig::table(table),
            handler,
        )
    }

    /// Registers an action handler with full metadata.
    pub fn action_with_owner<H>(
        mut self,
        owner: impl Into<String>,
        method: impl Into<String>,
        name: impl Into<String>,
        handler: H,
    ) -> Self
    where
        H: ActionHandler + 'static,
    {
        self.actions.push(DiscoveredActionHandler {
            owner: owner.into(),
            method: method.into(),
            name: name.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Registers an action handler, called with `(input, action, headers)`.
    pub fn action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, Arc<ActionPayload>, Arc<HeaderMap>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let name = name.into();
        self.action_with_owner(REGISTRY_OWNER, name.clone(), name, handler)
    }

    /// Appends every handler reported by another source.
    pub fn extend_from<S: HandlerSource + ?Sized>(mut self, source: &S) -> Self {
        self.events.extend(source.event_handlers());
        self.actions.extend(source.action_handlers());
        self
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

impl HandlerSource for HandlerRegistry {
    fn event_handlers(&self) -> Vec<DiscoveredEventHandler> {
        self.events.clone()
    }

    fn action_handlers(&self) -> Vec<DiscoveredActionHandler> {
        self.actions.clone()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("events", &self.events)
            .field("actions", &self.actions)
            .finish()
    }
}
