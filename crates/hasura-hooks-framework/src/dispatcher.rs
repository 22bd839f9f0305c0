//! Event dispatcher.
//!
//! [`EventDispatcher`] classifies an incoming event body, looks up every
//! handler bound to one of its candidate keys and runs them together:
//!
//! 1. Classification failures are returned as-is
//! 2. No matching handler is a [`HandlerNotFoundError`], naming the keys tried
//! 3. Matching handlers are polled concurrently on the caller's task and all
//!    of them run to completion, even when one fails
//! 4. Results are returned in registration order; if any handler failed, the
//!    first failure in registration order is returned instead
//!
//! The reported failure does not depend on timing: a slow handler registered
//! first wins over a fast one registered after it, even though the fast one
//! settled earlier.
//!
//! There is no timeout or retry. Callers that need a deadline can wrap the
//! dispatcher, which is also a [`tower::Service`].

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::Service;
use tracing::{Instrument, debug, error, info, info_span};

use hasura_hooks_core::{
    BoxError, BoxFuture, ClassifiedEvent, DispatchError, DispatchResult, EventPayload,
    HandlerNotFoundError, RoutingKey, classify,
};

use crate::table::EventHandlerTable;

/// Per-dispatch logging switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Log every received event with its candidate keys.
    pub enable_event_logs: bool,
    /// Include the full event body in those logs.
    pub log_payloads: bool,
}

/// Routes classified events to their handlers.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    table: Arc<EventHandlerTable>,
    options: DispatchOptions,
}

impl EventDispatcher {
    pub fn new(table: Arc<EventHandlerTable>) -> Self {
        Self {
            table,
            options: DispatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn table(&self) -> &EventHandlerTable {
        &self.table
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Classifies a raw event body and dispatches it.
    pub async fn dispatch(&self, payload: Value) -> DispatchResult<Vec<Value>> {
        let classified = classify(payload).inspect_err(|err| {
            debug!(error = %err, "Rejected event payload");
        })?;
        self.dispatch_classified(classified).await
    }

    /// Dispatches an already classified event.
    pub async fn dispatch_classified(
        &self,
        classified: ClassifiedEvent,
    ) -> DispatchResult<Vec<Value>> {
        let ClassifiedEvent { payload, keys } = classified;
        let span = info_span!(
            "dispatch_event",
            kind = payload.kind().as_str(),
            id = %payload.id()
        );
        self.run(Arc::new(payload), keys).instrument(span).await
    }

    async fn run(
        &self,
        event: Arc<EventPayload>,
        keys: Vec<RoutingKey>,
    ) -> DispatchResult<Vec<Value>> {
        if self.options.enable_event_logs {
            if self.options.log_payloads {
                let body = serde_json::to_string(event.as_ref()).unwrap_or_default();
                info!(keys = ?keys, payload = %body, "Received event");
            } else {
                info!(keys = ?keys, "Received event");
            }
        }

        let routes = self.table.lookup(&keys);
        if routes.is_empty() {
            info!(keys = ?keys, "No event handler registered");
            return Err(HandlerNotFoundError::Event { keys }.into());
        }

        debug!(handlers = routes.len(), "Invoking event handlers");
        let outcomes = join_all(routes.iter().map(|route| route.call(Arc::clone(&event)))).await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error: Option<BoxError> = None;
        for (route, outcome) in routes.iter().zip(outcomes) {
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    error!(
                        owner = route.owner(),
                        method = route.method(),
                        key = %route.key(),
                        error = %err,
                        "Event handler failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(DispatchError::Handler(err)),
            None => Ok(results),
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("route_count", &self.table.len())
            .field("options", &self.options)
            .finish()
    }
}

impl Service<Value> for EventDispatcher {
    type Response = Vec<Value>;
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult<Vec<Value>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, payload: Value) -> Self::Future {
        let dispatcher = self.clone();
        async move { dispatcher.dispatch(payload).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HandlerRegistry;
    use hasura_hooks_core::{ClassificationError, EventBindingConfig, TableRef};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn dispatcher(registry: &HandlerRegistry) -> EventDispatcher {
        EventDispatcher::new(Arc::new(EventHandlerTable::build(registry).unwrap()))
    }

    fn table_event(trigger: &str, schema: Option<&str>, table: &str) -> Value {
        let mut table_ref = json!({ "name": table });
        if let Some(schema) = schema {
            table_ref["schema"] = json!(schema);
        }
        json!({
            "id": "85558393-c75d-4d2f-9c15-e80591b83894",
            "created_at": "2024-05-01T10:00:00.000Z",
            "trigger": { "name": trigger },
            "table": table_ref,
            "event": {
                "op": "INSERT",
                "data": { "old": null, "new": { "id": 1, "title": "write docs" } },
                "session_variables": { "x-hasura-role": "admin" }
            },
            "delivery_info": { "max_retries": 0, "current_retry": 0 }
        })
    }

    fn counting(counter: &Arc<AtomicUsize>, reply: Value) -> HandlerRegistry {
        let counter = Arc::clone(counter);
        HandlerRegistry::new().on_trigger("todo_created", move |_event| {
            let counter = Arc::clone(&counter);
            let reply = reply.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BoxError>(reply)
            }
        })
    }

    #[tokio::test]
    async fn test_trigger_binding_invokes_exactly_that_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let other = Arc::new(AtomicUsize::new(0));
        let (h, o) = (Arc::clone(&hits), Arc::clone(&other));
        let registry = HandlerRegistry::new()
            .on_trigger("todo_created", move |_event| {
                let hits = Arc::clone(&h);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(json!("created"))
                }
            })
            .on_trigger("todo_deleted", move |_event| {
                let other = Arc::clone(&o);
                async move {
                    other.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(json!("deleted"))
                }
            });

        let results = dispatcher(&registry)
            .dispatch(table_event("todo_created", Some("public"), "todos"))
            .await
            .unwrap();

        assert_eq!(results, vec![json!("created")]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_table_binding_defaults_schema_on_both_sides() {
        let registry = HandlerRegistry::new().on_table(None, "todos", |event| async move {
            Ok::<_, BoxError>(json!(event.id()))
        });
        let dispatcher = dispatcher(&registry);

        let with_schema = dispatcher
            .dispatch(table_event("other_trigger", Some("public"), "todos"))
            .await
            .unwrap();
        assert_eq!(with_schema.len(), 1);

        let without_schema = dispatcher
            .dispatch(table_event("other_trigger", None, "todos"))
            .await
            .unwrap();
        assert_eq!(without_schema.len(), 1);

        let mut null_schema = table_event("other_trigger", None, "todos");
        null_schema["table"]["schema"] = Value::Null;
        let results = dispatcher.dispatch(null_schema).await.unwrap();
        assert_eq!(results, vec![json!("85558393-c75d-4d2f-9c15-e80591b83894")]);

        let err = dispatcher
            .dispatch(table_event("other_trigger", Some("audit"), "todos"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::HandlerNotFound(_)));
    }

    #[tokio::test]
    async fn test_dual_binding_is_not_deduplicated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config =
            EventBindingConfig::trigger("todo_created").with_table(TableRef::new(None, "todos"));
        let registry = HandlerRegistry::new().event("app", "on_todo", config, move |_event| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BoxError>(Value::Null)
            }
        });
        let dispatcher = dispatcher(&registry);

        let results = dispatcher
            .dispatch(table_event("todo_created", None, "todos"))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        dispatcher
            .dispatch(table_event("todo_created", Some("public"), "archive"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fan_out_results_follow_registration_order() {
        let registry = HandlerRegistry::new()
            .on_trigger("todo_created", |_event| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, BoxError>(json!("slow first"))
            })
            .on_trigger("todo_created", |_event| async {
                Ok::<_, BoxError>(json!("fast second"))
            });

        let results = dispatcher(&registry)
            .dispatch(table_event("todo_created", None, "todos"))
            .await
            .unwrap();
        assert_eq!(results, vec![json!("slow first"), json!("fast second")]);
    }

    #[tokio::test]
    async fn test_scheduled_event_routes_by_name() {
        let registry = HandlerRegistry::new()
            .on_trigger("nightly_cleanup", |event| async move {
                let scheduled = event.as_scheduled().cloned();
                Ok::<_, BoxError>(json!(scheduled.map(|s| s.payload)))
            })
            .on_table(None, "nightly_cleanup", |_event| async {
                Ok::<_, BoxError>(json!("never"))
            });

        let results = dispatcher(&registry)
            .dispatch(json!({
                "id": "e-42",
                "name": "nightly_cleanup",
                "scheduled_time": "2024-05-02T03:00:00Z",
                "payload": { "older_than_days": 30 }
            }))
            .await
            .unwrap();
        assert_eq!(results, vec![json!({ "older_than_days": 30 })]);
    }

    #[tokio::test]
    async fn test_unrecognized_payload_fails_classification() {
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(&counting(&hits, Value::Null));

        for payload in [
            json!({ "hello": "world" }),
            json!({ "id": "", "table": {}, "trigger": {} }),
            json!([1, 2, 3]),
        ] {
            let err = dispatcher.dispatch(payload).await.unwrap_err();
            assert!(matches!(
                err,
                DispatchError::Classification(ClassificationError::Unrecognized)
            ));
            assert!(err.is_client_error());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_handler_names_attempted_keys() {
        let dispatcher = dispatcher(&HandlerRegistry::new());
        let err = dispatcher
            .dispatch(table_event("todo_created", Some("app"), "todos"))
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        match err {
            DispatchError::HandlerNotFound(HandlerNotFoundError::Event { keys }) => {
                assert_eq!(
                    keys,
                    vec![RoutingKey::from("todo_created"), RoutingKey::from("app-todos")]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_cancel_sibling() {
        let finished = Arc::new(AtomicUsize::new(0));
        let sibling = Arc::clone(&finished);
        let registry = HandlerRegistry::new()
            .on_trigger("todo_created", |_event| async {
                Err::<Value, BoxError>("mailer unavailable".into())
            })
            .on_trigger("todo_created", move |_event| {
                let sibling = Arc::clone(&sibling);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    sibling.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(Value::Null)
                }
            });

        let err = dispatcher(&registry)
            .dispatch(table_event("todo_created", None, "todos"))
            .await
            .unwrap_err();

        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "mailer unavailable");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_error_in_registration_order() {
        let registry = HandlerRegistry::new()
            .on_trigger("todo_created", |_event| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<Value, BoxError>("first".into())
            })
            .on_trigger("todo_created", |_event| async {
                Err::<Value, BoxError>("second".into())
            });

        let err = dispatcher(&registry)
            .dispatch(table_event("todo_created", None, "todos"))
            .await
            .unwrap_err();
        assert_eq!(err.into_handler_error().unwrap().to_string(), "first");
    }

    #[tokio::test]
    async fn test_independent_dispatchers() {
        let a = dispatcher(&HandlerRegistry::new().on_trigger("t", |_event| async {
            Ok::<_, BoxError>(json!("a"))
        }));
        let b = dispatcher(&HandlerRegistry::new());

        assert_eq!(
            a.dispatch(table_event("t", None, "x")).await.unwrap(),
            vec![json!("a")]
        );
        assert!(b.dispatch(table_event("t", None, "x")).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatcher_as_service() {
        let dispatcher = dispatcher(&HandlerRegistry::new().on_trigger("t", |_event| async {
            Ok::<_, BoxError>(json!(true))
        }))
        .with_options(DispatchOptions {
            enable_event_logs: true,
            log_payloads: true,
        });

        let results = dispatcher
            .oneshot(table_event("t", None, "x"))
            .await
            .unwrap();
        assert_eq!(results, vec![json!(true)]);
    }
}
