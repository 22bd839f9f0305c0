//! Action dispatcher.
//!
//! Actions have exactly one handler, looked up by the exact action name. The
//! handler receives `(input, action, headers)` and its result is returned to
//! the caller unchanged.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use http::HeaderMap;
use serde_json::Value;
use tower::Service;
use tracing::{Instrument, debug, error, info_span};

use hasura_hooks_core::{
    ActionPayload, BoxFuture, DispatchError, DispatchResult, HandlerNotFoundError,
};

use crate::table::ActionHandlerTable;

/// A raw action request as received from Hasura.
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    pub payload: Value,
    pub headers: HeaderMap,
}

impl ActionRequest {
    pub fn new(payload: Value, headers: HeaderMap) -> Self {
        Self { payload, headers }
    }
}

/// Routes action invocations to their handler.
#[derive(Clone, Default)]
pub struct ActionDispatcher {
    table: Arc<ActionHandlerTable>,
}

impl ActionDispatcher {
    pub fn new(table: Arc<ActionHandlerTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ActionHandlerTable {
        &self.table
    }

    /// Invokes the handler registered for `action`.
    ///
    /// # Errors
    ///
    /// - [`HandlerNotFoundError::Action`] if no handler has the action's name
    /// - [`DispatchError::Handler`] with the handler's own error
    pub async fn dispatch(&self, action: ActionPayload, headers: HeaderMap) -> DispatchResult<Value> {
        let Some(route) = self.table.get(action.name()) else {
            debug!(action = action.name(), "No action handler registered");
            return Err(HandlerNotFoundError::Action {
                name: action.action.name,
            }
            .into());
        };

        let span = info_span!("dispatch_action", action = action.name(), method = route.method());
        let input = action.input.clone();
        let call = route.call(input, Arc::new(action), Arc::new(headers));

        call.instrument(span.clone()).await.map_err(|err| {
            span.in_scope(|| error!(owner = route.owner(), error = %err, "Action handler failed"));
            DispatchError::Handler(err)
        })
    }

    /// Decodes a raw action body and dispatches it.
    pub async fn dispatch_value(&self, payload: Value, headers: HeaderMap) -> DispatchResult<Value> {
        let action = ActionPayload::from_value(payload).inspect_err(|err| {
            debug!(error = %err, "Rejected action payload");
        })?;
        self.dispatch(action, headers).await
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("actions", &self.table.names())
            .finish()
    }
}

impl Service<ActionRequest> for ActionDispatcher {
    type Response = Value;
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult<Value>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ActionRequest) -> Self::Future {
        let dispatcher = self.clone();
        async move {
            dispatcher
                .dispatch_value(request.payload, request.headers)
                .await
        }
        .boxed()
    }
}
