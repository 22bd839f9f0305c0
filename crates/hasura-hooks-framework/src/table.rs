//! Handler tables.
//!
//! Tables are built once from a [`HandlerSource`] before the service accepts
//! traffic and are read-only afterwards. Dispatchers share them behind an
//! `Arc`, so concurrent dispatches read them without coordination.
//!
//! # Event table
//!
//! Every binding contributes one route per routing key. A binding with both a
//! trigger and a table therefore owns two routes, and an event matching both
//! keys reaches the handler twice. Routes are kept in discovery order, which
//! is also the order matched handlers are reported in.
//!
//! # Action table
//!
//! One handler per action name. What happens when two handlers claim the same
//! name is decided by [`DuplicateActionPolicy`].

use std::collections::HashMap;
use std::sync::Arc;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use hasura_hooks_core::{
    ActionPayload, BoxFuture, BoxedActionHandler, BoxedEventHandler, ConfigurationError,
    DiscoveredActionHandler, DiscoveredEventHandler, EventPayload, HandlerResult, HandlerSource,
    RoutingKey,
};

// ============================================================================
// Event table
// ============================================================================

/// One `(key, handler)` pair of the event table.
#[derive(Clone)]
pub struct EventRoute {
    key: RoutingKey,
    owner: String,
    method: String,
    handler: BoxedEventHandler,
}

impl EventRoute {
    pub fn key(&self) -> &RoutingKey {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Invokes the handler.
    pub fn call(&self, event: Arc<EventPayload>) -> BoxFuture<'static, HandlerResult> {
        self.handler.call(event)
    }
}

impl std::fmt::Debug for EventRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRoute")
            .field("key", &self.key)
            .field("owner", &self.owner)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Routing key → ordered handlers.
#[derive(Clone, Default)]
pub struct EventHandlerTable {
    routes: Vec<EventRoute>,
    by_key: HashMap<RoutingKey, Vec<usize>>,
}

impl EventHandlerTable {
    /// Builds the table from every event handler a source reports.
    pub fn build<S: HandlerSource + ?Sized>(source: &S) -> Result<Self, ConfigurationError> {
        Self::from_handlers(source.event_handlers())
    }

    /// Builds the table from discovered handlers, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingBinding`] for the first handler
    /// that declares neither a trigger nor a table.
    pub fn from_handlers(handlers: Vec<DiscoveredEventHandler>) -> Result<Self, ConfigurationError> {
        for (owner, methods) in group_by_owner(handlers.iter().map(|h| (&h.owner, &h.method))) {
            info!(owner, handlers = ?methods, "Registering event handlers");
        }

        let mut routes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let config = &handler.config;
            if config.is_empty() {
                return Err(ConfigurationError::MissingBinding {
                    owner: handler.owner,
                    method: handler.method,
                });
            }
            if let Some(table) = &config.table {
                warn!(
                    owner = %handler.owner,
                    method = %handler.method,
                    table = %table,
                    "Table bindings are deprecated, bind to the event trigger name instead"
                );
            }
            if config.is_dual() {
                warn!(
                    owner = %handler.owner,
                    method = %handler.method,
                    "Handler is bound to both a trigger and a table; events matching both \
                     are delivered to it twice"
                );
            }

            for key in config.routing_keys() {
                debug!(key = %key, method = %handler.method, "Adding event route");
                routes.push(EventRoute {
                    key,
                    owner: handler.owner.clone(),
                    method: handler.method.clone(),
                    handler: Arc::clone(&handler.handler),
                });
            }
        }

        let mut by_key: HashMap<RoutingKey, Vec<usize>> = HashMap::new();
        for (index, route) in routes.iter().enumerate() {
            by_key.entry(route.key.clone()).or_default().push(index);
        }

        info!(
            routes = routes.len(),
            keys = by_key.len(),
            "Event handler table built"
        );
        Ok(Self { routes, by_key })
    }

    /// Returns every route whose key equals any of `keys`, in registration
    /// order.
    ///
    /// A route is returned once even if `keys` names its key twice; distinct
    /// routes of the same handler are all returned.
    pub fn lookup(&self, keys: &[RoutingKey]) -> Vec<&EventRoute> {
        let mut indices: Vec<usize> = keys
            .iter()
            .filter_map(|key| self.by_key.get(key))
            .flatten()
            .copied()
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|index| &self.routes[index]).collect()
    }

    /// Returns the routes registered under one key.
    pub fn routes_for(&self, key: &RoutingKey) -> Vec<&EventRoute> {
        self.lookup(std::slice::from_ref(key))
    }

    /// Iterates every route in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &EventRoute> {
        self.routes.iter()
    }

    /// Number of routes (not handlers: a dual binding counts twice).
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for EventHandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlerTable")
            .field("route_count", &self.routes.len())
            .field("key_count", &self.by_key.len())
            .finish()
    }
}

// ============================================================================
// Action table
// ============================================================================

/// How the action table treats two handlers for the same action name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateActionPolicy {
    /// The handler discovered last replaces earlier ones, with a warning.
    #[default]
    LastWins,
    /// Startup fails with [`ConfigurationError::DuplicateAction`].
    Reject,
}

/// The single handler bound to an action name.
#[derive(Clone)]
pub struct ActionRoute {
    name: String,
    owner: String,
    method: String,
    handler: BoxedActionHandler,
}

impl ActionRoute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Invokes the handler with `(input, action, headers)`.
    pub fn call(
        &self,
        input: Value,
        action: Arc<ActionPayload>,
        headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult> {
        self.handler.call(input, action, headers)
    }

    fn qualified_name(&self) -> String {
        format!("{}::{}", self.owner, self.method)
    }
}

impl std::fmt::Debug for ActionRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRoute")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Action name → handler.
#[derive(Clone, Default)]
pub struct ActionHandlerTable {
    by_name: HashMap<String, ActionRoute>,
}

impl ActionHandlerTable {
    /// Builds the table from every action handler a source reports.
    pub fn build<S: HandlerSource + ?Sized>(
        source: &S,
        policy: DuplicateActionPolicy,
    ) -> Result<Self, ConfigurationError> {
        Self::from_handlers(source.action_handlers(), policy)
    }

    /// Builds the table from discovered handlers, in the given order.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::EmptyActionName`] for a handler with an empty name
    /// - [`ConfigurationError::DuplicateAction`] when `policy` is
    ///   [`DuplicateActionPolicy::Reject`] and two handlers share a name
    pub fn from_handlers(
        handlers: Vec<DiscoveredActionHandler>,
        policy: DuplicateActionPolicy,
    ) -> Result<Self, ConfigurationError> {
        for (owner, methods) in group_by_owner(handlers.iter().map(|h| (&h.owner, &h.method))) {
            info!(owner, handlers = ?methods, "Registering action handlers");
        }

        let mut by_name: HashMap<String, ActionRoute> = HashMap::with_capacity(handlers.len());
        for handler in handlers {
            if handler.name.is_empty() {
                return Err(ConfigurationError::EmptyActionName {
                    owner: handler.owner,
                    method: handler.method,
                });
            }

            let route = ActionRoute {
                name: handler.name,
                owner: handler.owner,
                method: handler.method,
                handler: handler.handler,
            };

            if let Some(previous) = by_name.get(&route.name) {
                match policy {
                    DuplicateActionPolicy::Reject => {
                        return Err(ConfigurationError::DuplicateAction {
                            name: route.name.clone(),
                            first: previous.qualified_name(),
                            second: route.qualified_name(),
                        });
                    }
                    DuplicateActionPolicy::LastWins => {
                        warn!(
                            action = %route.name,
                            replaced = %previous.qualified_name(),
                            by = %route.qualified_name(),
                            "Duplicate action handler, the last one registered wins"
                        );
                    }
                }
            }
            by_name.insert(route.name.clone(), route);
        }

        info!(actions = by_name.len(), "Action handler table built");
        Ok(Self { by_name })
    }

    /// Looks up the handler for an action name (exact match).
    pub fn get(&self, name: &str) -> Option<&ActionRoute> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for ActionHandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandlerTable")
            .field("actions", &self.names())
            .finish()
    }
}

// ============================================================================
// Both tables
// ============================================================================

/// The event and action tables of one application.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    pub events: Arc<EventHandlerTable>,
    pub actions: Arc<ActionHandlerTable>,
}

impl HandlerTable {
    /// Builds both tables from one source.
    pub fn build<S: HandlerSource + ?Sized>(
        source: &S,
        policy: DuplicateActionPolicy,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            events: Arc::new(EventHandlerTable::build(source)?),
            actions: Arc::new(ActionHandlerTable::build(source, policy)?),
        })
    }
}

/// Groups `(owner, method)` pairs by owner, in first-seen order.
fn group_by_owner<'a>(
    items: impl Iterator<Item = (&'a String, &'a String)>,
) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for (owner, method) in items {
        match groups.iter_mut().find(|(seen, _)| *seen == owner.as_str()) {
            Some((_, methods)) => methods.push(method.as_str()),
            None => groups.push((owner.as_str(), vec![method.as_str()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HandlerRegistry;
    use hasura_hooks_core::{BoxError, EventBindingConfig, TableRef};
    use serde_json::json;

    fn noop_event(_event: Arc<EventPayload>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async { Ok::<_, BoxError>(Value::Null) })
    }

    fn noop_action(
        _input: Value,
        _action: Arc<ActionPayload>,
        _headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async { Ok::<_, BoxError>(Value::Null) })
    }

    #[test]
    fn test_missing_binding_is_rejected() {
        let registry = HandlerRegistry::new()
            .on_trigger("ok", noop_event)
            .event("app::users", "orphan", EventBindingConfig::EMPTY, noop_event);

        let err = EventHandlerTable::build(&registry).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingBinding {
                owner: "app::users".into(),
                method: "orphan".into(),
            }
        );
    }

    #[test]
    fn test_dual_binding_registers_two_routes() {
        let config = EventBindingConfig::trigger("user_created")
            .with_table(TableRef::new(None, "users"));
        let registry = HandlerRegistry::new().event("app", "on_user", config, noop_event);

        let table = EventHandlerTable::build(&registry).unwrap();
        assert_eq!(table.len(), 2);

        let keys: Vec<_> = table.routes().map(|route| route.key().as_str()).collect();
        assert_eq!(keys, ["user_created", "public-users"]);

        let both = table.lookup(&[
            RoutingKey::from("user_created"),
            RoutingKey::from("public-users"),
        ]);
        assert_eq!(both.len(), 2);
        assert!(both.iter().all(|route| route.method() == "on_user"));
    }

    #[test]
    fn test_lookup_preserves_registration_order() {
        let registry = HandlerRegistry::new()
            .event(
                "a",
                "by_table",
                EventBindingConfig::table(TableRef::new(None, "orders")),
                noop_event,
            )
            .event("b", "first", EventBindingConfig::trigger("order_placed"), noop_event)
            .event("c", "second", EventBindingConfig::trigger("order_placed"), noop_event);

        let table = EventHandlerTable::build(&registry).unwrap();
        let methods: Vec<_> = table
            .lookup(&[
                RoutingKey::from("order_placed"),
                RoutingKey::from("public-orders"),
                RoutingKey::from("order_placed"),
            ])
            .into_iter()
            .map(EventRoute::method)
            .collect();
        assert_eq!(methods, ["by_table", "first", "second"]);
        assert!(table.lookup(&[RoutingKey::from("unknown")]).is_empty());
    }

    #[test]
    fn test_empty_source_builds_empty_tables() {
        let tables = HandlerTable::build(&HandlerRegistry::new(), DuplicateActionPolicy::Reject)
            .unwrap();
        assert!(tables.events.is_empty());
        assert!(tables.actions.is_empty());
    }

    #[test]
    fn test_duplicate_action_last_wins() {
        let registry = HandlerRegistry::new()
            .action_with_owner("app::auth", "login_v1", "login", noop_action)
            .action_with_owner("app::auth", "login_v2", "login", noop_action);

        let table = ActionHandlerTable::build(&registry, DuplicateActionPolicy::LastWins).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("login").unwrap().method(), "login_v2");
    }

    #[test]
    fn test_duplicate_action_rejected() {
        let registry = HandlerRegistry::new()
            .action_with_owner("app::auth", "login_v1", "login", noop_action)
            .action_with_owner("app::legacy", "login", "login", noop_action);

        let err = ActionHandlerTable::build(&registry, DuplicateActionPolicy::Reject).unwrap_err();
        assert_eq!(
            err.to_string(),
            "action `login` is handled by both `app::auth::login_v1` and `app::legacy::login`"
        );
    }

    #[test]
    fn test_empty_action_name_rejected() {
        let registry = HandlerRegistry::new().action_with_owner("app", "nameless", "", noop_action);
        assert!(matches!(
            ActionHandlerTable::build(&registry, DuplicateActionPolicy::LastWins),
            Err(ConfigurationError::EmptyActionName { .. })
        ));
    }

    #[test]
    fn test_policy_serde() {
        let policy: DuplicateActionPolicy = serde_json::from_value(json!("reject")).unwrap();
        assert_eq!(policy, DuplicateActionPolicy::Reject);
        assert_eq!(
            serde_json::to_value(DuplicateActionPolicy::LastWins).unwrap(),
            json!("last-wins")
        );
    }

    #[test]
    fn test_group_by_owner_keeps_first_seen_order() {
        let pairs = [
            ("b".to_string(), "one".to_string()),
            ("a".to_string(), "two".to_string()),
            ("b".to_string(), "three".to_string()),
        ];
        let groups = group_by_owner(pairs.iter().map(|(o, m)| (o, m)));
        assert_eq!(groups, vec![("b", vec!["one", "three"]), ("a", vec!["two"])]);
    }
}
