//! Handler traits and calling conventions.
//!
//! Handlers are stored type-erased behind [`EventHandler`] and
//! [`ActionHandler`]. Both are implemented for any matching closure, so
//! handlers can be registered directly:
//!
//! ```rust,ignore
//! registry.on_trigger("user_created", |event: Arc<EventPayload>| async move {
//!     Ok::<_, BoxError>(json!({ "seen": event.id() }))
//! });
//! ```
//!
//! The attribute macros go one step further and adapt ordinary async
//! functions through [`call_event_fn`] and [`call_action_fn`]: the argument
//! is produced by [`FromPayload`] (or deserialized from the action input) and
//! the return value is turned into a [`HandlerResult`] by
//! [`IntoHandlerResult`].

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
pub use futures::future::BoxFuture;
use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{BoxError, ExtractError};
use crate::payload::{ActionPayload, EventPayload, ScheduledEvent, TableEvent};

/// Output of a single handler invocation.
pub type HandlerResult = Result<Value, BoxError>;

// ============================================================================
// Erased handler traits
// ============================================================================

/// A type-erased event handler.
pub trait EventHandler: Send + Sync {
    fn call(&self, event: Arc<EventPayload>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(Arc<EventPayload>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, event: Arc<EventPayload>) -> BoxFuture<'static, HandlerResult> {
        (self)(event).boxed()
    }
}

/// A shareable event handler.
pub type BoxedEventHandler = Arc<dyn EventHandler>;

/// A type-erased action handler, called with `(input, action, headers)`.
pub trait ActionHandler: Send + Sync {
    fn call(
        &self,
        input: Value,
        action: Arc<ActionPayload>,
        headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> ActionHandler for F
where
    F: Fn(Value, Arc<ActionPayload>, Arc<HeaderMap>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(
        &self,
        input: Value,
        action: Arc<ActionPayload>,
        headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult> {
        (self)(input, action, headers).boxed()
    }
}

/// A shareable action handler.
pub type BoxedActionHandler = Arc<dyn ActionHandler>;

// ============================================================================
// Return values
// ============================================================================

/// Converts a handler's return value into a [`HandlerResult`].
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(Value::Null)
    }
}

impl IntoHandlerResult for Value {
    fn into_handler_result(self) -> HandlerResult {
        Ok(self)
    }
}

/// `None` becomes JSON `null`.
impl<T: Serialize> IntoHandlerResult for Option<T> {
    fn into_handler_result(self) -> HandlerResult {
        Ok(serde_json::to_value(self)?)
    }
}

impl<T, E> IntoHandlerResult for Result<T, E>
where
    T: Serialize,
    E: Into<BoxError>,
{
    fn into_handler_result(self) -> HandlerResult {
        let value = self.map_err(Into::into)?;
        Ok(serde_json::to_value(value)?)
    }
}

// ============================================================================
// Event handler arguments
// ============================================================================

/// Produces an event handler's argument from the classified payload.
pub trait FromPayload: Sized {
    fn from_payload(event: &Arc<EventPayload>) -> Result<Self, ExtractError>;
}

impl FromPayload for Arc<EventPayload> {
    fn from_payload(event: &Arc<EventPayload>) -> Result<Self, ExtractError> {
        Ok(Arc::clone(event))
    }
}

impl FromPayload for EventPayload {
    fn from_payload(event: &Arc<EventPayload>) -> Result<Self, ExtractError> {
        Ok(event.as_ref().clone())
    }
}

impl FromPayload for TableEvent {
    fn from_payload(event: &Arc<EventPayload>) -> Result<Self, ExtractError> {
        event
            .as_table()
            .cloned()
            .ok_or_else(|| ExtractError::KindMismatch {
                expected: "table event",
                got: event.kind().as_str(),
            })
    }
}

impl FromPayload for ScheduledEvent {
    fn from_payload(event: &Arc<EventPayload>) -> Result<Self, ExtractError> {
        event
            .as_scheduled()
            .cloned()
            .ok_or_else(|| ExtractError::KindMismatch {
                expected: "scheduled event",
                got: event.kind().as_str(),
            })
    }
}

/// Calls a single-argument async function as an event handler.
pub fn call_event_fn<F, A, Fut>(f: F, event: Arc<EventPayload>) -> BoxFuture<'static, HandlerResult>
where
    F: FnOnce(A) -> Fut,
    A: FromPayload,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    match A::from_payload(&event) {
        Ok(arg) => {
            let fut = f(arg);
            async move { fut.await.into_handler_result() }.boxed()
        }
        Err(err) => futures::future::ready(Err(err.into())).boxed(),
    }
}

// ============================================================================
// Action handler arguments
// ============================================================================

/// Async functions usable as action handlers.
///
/// The first parameter receives the deserialized action input; the action
/// payload and the request headers may follow, in that order.
pub trait ActionFn<Args> {
    fn call_action(
        self,
        input: Value,
        action: Arc<ActionPayload>,
        headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult>;
}

fn decode_input<I: DeserializeOwned>(input: Value) -> Result<I, BoxError> {
    serde_json::from_value(input).map_err(|err| ExtractError::Input(err).into())
}

fn settle<Fut>(fut: Fut) -> BoxFuture<'static, HandlerResult>
where
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    async move { fut.await.into_handler_result() }.boxed()
}

macro_rules! try_input {
    ($input:expr) => {
        match decode_input($input) {
            Ok(input) => input,
            Err(err) => return futures::future::ready(Err(err)).boxed(),
        }
    };
}

impl<F, Fut, I> ActionFn<(I,)> for F
where
    F: FnOnce(I) -> Fut,
    I: DeserializeOwned,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call_action(
        self,
        input: Value,
        _action: Arc<ActionPayload>,
        _headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult> {
        settle(self(try_input!(input)))
    }
}

impl<F, Fut, I> ActionFn<(I, Arc<ActionPayload>)> for F
where
    F: FnOnce(I, Arc<ActionPayload>) -> Fut,
    I: DeserializeOwned,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call_action(
        self,
        input: Value,
        action: Arc<ActionPayload>,
        _headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult> {
        settle(self(try_input!(input), action))
    }
}

impl<F, Fut, I> ActionFn<(I, Arc<ActionPayload>, Arc<HeaderMap>)> for F
where
    F: FnOnce(I, Arc<ActionPayload>, Arc<HeaderMap>) -> Fut,
    I: DeserializeOwned,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call_action(
        self,
        input: Value,
        action: Arc<ActionPayload>,
        headers: Arc<HeaderMap>,
    ) -> BoxFuture<'static, HandlerResult> {
        settle(self(try_input!(input), action, headers))
    }
}

/// Calls an async function as an action handler.
pub fn call_action_fn<F, Args>(
    f: F,
    input: Value,
    action: Arc<ActionPayload>,
    headers: Arc<HeaderMap>,
) -> BoxFuture<'static, HandlerResult>
where
    F: ActionFn<Args>,
{
    f.call_action(input, action, headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use serde::Deserialize;
    use serde_json::json;

    fn table_event() -> Arc<EventPayload> {
        let classified = classify(json!({
            "id": "e-1",
            "trigger": { "name": "user_created" },
            "table": { "schema": "public", "name": "users" },
            "event": { "op": "INSERT", "data": { "old": null, "new": { "id": 7 } } }
        }))
        .unwrap();
        Arc::new(classified.payload)
    }

    fn action(input: Value) -> Arc<ActionPayload> {
        Arc::new(
            ActionPayload::from_value(json!({ "action": { "name": "login" }, "input": input }))
                .unwrap(),
        )
    }

    async fn count_rows(event: TableEvent) -> Result<usize, BoxError> {
        Ok(event.new_row::<Value>()?.into_iter().count())
    }

    async fn only_scheduled(event: ScheduledEvent) -> Option<String> {
        Some(event.name)
    }

    #[derive(Deserialize)]
    struct LoginInput {
        username: String,
    }

    async fn login(input: LoginInput, action: Arc<ActionPayload>) -> Result<Value, BoxError> {
        Ok(json!({ "user": input.username, "action": action.name() }))
    }

    async fn whoami(
        _input: Value,
        _action: Arc<ActionPayload>,
        headers: Arc<HeaderMap>,
    ) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn test_event_fn_receives_typed_event() {
        let result = call_event_fn(count_rows, table_event()).await.unwrap();
        assert_eq!(result, json!(1));
    }

    #[tokio::test]
    async fn test_event_fn_kind_mismatch_is_handler_error() {
        let err = call_event_fn(|event: ScheduledEvent| only_scheduled(event), table_event())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "handler expects a scheduled event, got a table event"
        );
    }

    #[tokio::test]
    async fn test_action_fn_arities() {
        let result = call_action_fn(
            login,
            json!({ "username": "ada" }),
            action(json!({ "username": "ada" })),
            Arc::new(HeaderMap::new()),
        )
        .await
        .unwrap();
        assert_eq!(result, json!({ "user": "ada", "action": "login" }));

        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "r-1".parse().unwrap());
        let result = call_action_fn(whoami, json!({}), action(json!({})), Arc::new(headers))
            .await
            .unwrap();
        assert_eq!(result, json!("r-1"));
    }

    #[tokio::test]
    async fn test_action_fn_rejects_bad_input() {
        let err = call_action_fn(
            login,
            json!({ "name": "ada" }),
            action(json!({})),
            Arc::new(HeaderMap::new()),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("failed to decode action input"));
    }

    #[test]
    fn test_into_handler_result() {
        assert_eq!(().into_handler_result().unwrap(), Value::Null);
        assert_eq!(
            Ok::<_, BoxError>(vec![1, 2]).into_handler_result().unwrap(),
            json!([1, 2])
        );
        let err: Result<(), &str> = Err("nope");
        assert_eq!(err.into_handler_result().unwrap_err().to_string(), "nope");
    }
}
