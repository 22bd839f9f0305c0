//! Shape-based event classification.
//!
//! Hasura does not tag event bodies with their kind, so the classifier sniffs
//! the shape of the JSON in a fixed priority order:
//!
//! 1. a non-empty string `id`, an object `table` and an object `trigger`
//!    make a [`TableEvent`]; Hasura always sends a UUID string here, so a
//!    numeric `id` does not count;
//! 2. `id`, `name`, `scheduled_time` and an object `payload` make a
//!    [`ScheduledEvent`];
//! 3. anything else is rejected with [`ClassificationError::Unrecognized`].
//!
//! A body that passes a shape check but does not decode into the typed
//! payload is [`ClassificationError::Malformed`].

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ClassificationError;
use crate::payload::{EventKind, EventPayload, ScheduledEvent, TableEvent};
use crate::routing::RoutingKey;

/// An event together with the routing keys it may be delivered under.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub payload: EventPayload,
    /// Candidate keys, without duplicates, in lookup order.
    pub keys: Vec<RoutingKey>,
}

impl ClassifiedEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Classifies a raw event body.
pub fn classify(value: Value) -> Result<ClassifiedEvent, ClassificationError> {
    let kind = sniff(&value).ok_or(ClassificationError::Unrecognized)?;
    trace!(kind = %kind, "Classified event payload");

    let payload = match kind {
        EventKind::Table => EventPayload::Table(decode::<TableEvent>(value, kind)?),
        EventKind::Scheduled => EventPayload::Scheduled(decode::<ScheduledEvent>(value, kind)?),
    };
    let keys = payload.routing_keys();

    Ok(ClassifiedEvent { payload, keys })
}

/// Determines the event kind from the payload's shape alone.
pub fn sniff(value: &Value) -> Option<EventKind> {
    let fields = value.as_object()?;

    if is_table_event(fields) {
        Some(EventKind::Table)
    } else if is_scheduled_event(fields) {
        Some(EventKind::Scheduled)
    } else {
        None
    }
}

/// Requires `id` to be a non-empty string.
fn is_table_event(fields: &Map<String, Value>) -> bool {
    let has_id = fields
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());

    has_id && is_object(fields, "table") && is_object(fields, "trigger")
}

fn is_scheduled_event(fields: &Map<String, Value>) -> bool {
    ["id", "name", "scheduled_time"]
        .iter()
        .all(|field| fields.get(*field).is_some_and(|value| !value.is_null()))
        && is_object(fields, "payload")
}

fn is_object(fields: &Map<String, Value>, field: &str) -> bool {
    fields.get(field).is_some_and(Value::is_object)
}

fn decode<T: serde::de::DeserializeOwned>(
    value: Value,
    kind: EventKind,
) -> Result<T, ClassificationError> {
    serde_json::from_value(value).map_err(|source| ClassificationError::Malformed {
        kind: kind.as_str(),
        source,
    })
}
