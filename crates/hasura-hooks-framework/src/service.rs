//! The boundary consumed by the HTTP layer.

use std::sync::Arc;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use hasura_hooks_core::{ConfigurationError, DispatchResult, HandlerSource};

use crate::action::ActionDispatcher;
use crate::dispatcher::{DispatchOptions, EventDispatcher};
use crate::table::{DuplicateActionPolicy, HandlerTable};

/// Options for building a [`HasuraService`] from a handler source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    #[serde(flatten)]
    pub dispatch: DispatchOptions,
    pub duplicate_actions: DuplicateActionPolicy,
}

/// Entry point for incoming events and actions.
///
/// Both dispatchers are supplied at construction; the service is cheap to
/// clone and can be shared by every request handler.
#[derive(Debug, Clone, Default)]
pub struct HasuraService {
    events: EventDispatcher,
    actions: ActionDispatcher,
}

impl HasuraService {
    pub fn new(events: EventDispatcher, actions: ActionDispatcher) -> Self {
        Self { events, actions }
    }

    /// Builds the handler tables from `source` and wires both dispatchers.
    ///
    /// # Errors
    ///
    /// Any [`ConfigurationError`] raised while building the tables. The
    /// service must not be started in that case.
    pub fn build<S: HandlerSource + ?Sized>(
        source: &S,
        options: ServiceOptions,
    ) -> Result<Self, ConfigurationError> {
        let table = HandlerTable::build(source, options.duplicate_actions)?;
        info!(
            event_routes = table.events.len(),
            actions = table.actions.len(),
            "Hasura service ready"
        );
        Ok(Self::from_table(table, options.dispatch))
    }

    /// Wires dispatchers around prebuilt tables.
    pub fn from_table(table: HandlerTable, options: DispatchOptions) -> Self {
        Self {
            events: EventDispatcher::new(table.events).with_options(options),
            actions: ActionDispatcher::new(table.actions),
        }
    }

    /// Dispatches a raw event body to every matching handler.
    pub async fn handle_event(&self, payload: Value) -> DispatchResult<Vec<Value>> {
        self.events.dispatch(payload).await
    }

    /// Dispatches a raw action body to its handler.
    pub async fn handle_action(&self, payload: Value, headers: HeaderMap) -> DispatchResult<Value> {
        self.actions.dispatch_value(payload, headers).await
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn actions(&self) -> &ActionDispatcher {
        &self.actions
    }

    /// Wraps the service in an `Arc` for sharing as application state.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
