//! Hasura webhook payloads.
//!
//! Hasura posts three kinds of bodies to an application:
//!
//! ```text
//! TableEvent      { id, created_at, trigger: {name}, table: {schema, name},
//!                   event: {op, data: {old, new}, session_variables}, delivery_info }
//! ScheduledEvent  { id, name, scheduled_time, payload, comment }
//! ActionPayload   { action: {name}, input, session_variables, request_query }
//! ```
//!
//! None of them carries an explicit type tag; event kinds are told apart by
//! shape in [`classify`](crate::classify). Unknown fields are kept in each
//! payload's `extra` map.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ClassificationError;
use crate::routing::{DEFAULT_SCHEMA, RoutingKey};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn null_as_default_schema<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_schema))
}

/// Hasura session variables (`x-hasura-role`, `x-hasura-user-id`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionVariables(HashMap<String, String>);

impl SessionVariables {
    /// Looks up a variable, ignoring ASCII case as Hasura does.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn role(&self) -> Option<&str> {
        self.get("x-hasura-role")
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get("x-hasura-user-id")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for SessionVariables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Table events
// ============================================================================

/// Qualified name of the table an event fired on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableName {
    #[serde(default = "default_schema", deserialize_with = "null_as_default_schema")]
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::for_table(Some(&self.schema), &self.name)
    }
}

/// The event trigger that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRef {
    pub name: String,
}

/// Database operation behind a table event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventOp {
    Insert,
    Update,
    Delete,
    /// Invoked from the Hasura console or API.
    Manual,
    /// An operation this crate does not know about.
    Other(String),
}

impl EventOp {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Manual => "MANUAL",
            Self::Other(op) => op,
        }
    }
}

impl From<String> for EventOp {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "MANUAL" => Self::Manual,
            _ => Self::Other(value),
        }
    }
}

impl From<EventOp> for String {
    fn from(value: EventOp) -> Self {
        match value {
            EventOp::Other(op) => op,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row images before and after the operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    #[serde(default)]
    pub old: Option<Value>,
    #[serde(default)]
    pub new: Option<Value>,
}

/// The `event` section of a table event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBody {
    pub op: EventOp,
    #[serde(default)]
    pub data: RowData,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_variables: SessionVariables,
    #[serde(default)]
    pub trace_context: Option<Value>,
}

/// Delivery attempt counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub current_retry: u32,
}

/// An event fired by a database event trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEvent {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub trigger: TriggerRef,
    pub table: TableName,
    #[serde(default)]
    pub event: Option<EventBody>,
    #[serde(default)]
    pub delivery_info: Option<DeliveryInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TableEvent {
    /// Candidate routing keys: the trigger name, then `{schema}-{table}`.
    pub fn routing_keys(&self) -> Vec<RoutingKey> {
        let trigger = RoutingKey::for_trigger(&self.trigger.name);
        let table = self.table.routing_key();
        if trigger == table {
            vec![trigger]
        } else {
            vec![trigger, table]
        }
    }

    pub fn op(&self) -> Option<&EventOp> {
        self.event.as_ref().map(|event| &event.op)
    }

    pub fn session_variables(&self) -> Option<&SessionVariables> {
        self.event.as_ref().map(|event| &event.session_variables)
    }

    /// Deserializes the row image after the operation, if any.
    pub fn new_row<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        self.row(|data| data.new.as_ref())
    }

    /// Deserializes the row image before the operation, if any.
    pub fn old_row<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        self.row(|data| data.old.as_ref())
    }

    fn row<T: DeserializeOwned>(
        &self,
        pick: impl FnOnce(&RowData) -> Option<&Value>,
    ) -> serde_json::Result<Option<T>> {
        match self.event.as_ref().and_then(|event| pick(&event.data)) {
            Some(Value::Null) | None => Ok(None),
            Some(row) => T::deserialize(row).map(Some),
        }
    }
}

// ============================================================================
// Scheduled events
// ============================================================================

/// A cron trigger or one-off scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: String,
    pub name: String,
    pub scheduled_time: String,
    pub payload: Value,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScheduledEvent {
    pub fn routing_keys(&self) -> Vec<RoutingKey> {
        vec![RoutingKey::for_trigger(&self.name)]
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

// ============================================================================
// Event payload
// ============================================================================

/// The two kinds of event Hasura delivers to the events endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Table,
    Scheduled,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table event",
            Self::Scheduled => "scheduled event",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Table(TableEvent),
    Scheduled(ScheduledEvent),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Table(_) => EventKind::Table,
            Self::Scheduled(_) => EventKind::Scheduled,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Table(event) => &event.id,
            Self::Scheduled(event) => &event.id,
        }
    }

    pub fn routing_keys(&self) -> Vec<RoutingKey> {
        match self {
            Self::Table(event) => event.routing_keys(),
            Self::Scheduled(event) => event.routing_keys(),
        }
    }

    pub fn as_table(&self) -> Option<&TableEvent> {
        match self {
            Self::Table(event) => Some(event),
            Self::Scheduled(_) => None,
        }
    }

    pub fn as_scheduled(&self) -> Option<&ScheduledEvent> {
        match self {
            Self::Scheduled(event) => Some(event),
            Self::Table(_) => None,
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Identity of an invoked action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionName {
    pub name: String,
}

/// An action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub action: ActionName,
    #[serde(default)]
    pub input: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_variables: SessionVariables,
    #[serde(default)]
    pub request_query: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionPayload {
    /// Decodes an action invocation from a raw request body.
    pub fn from_value(value: Value) -> Result<Self, ClassificationError> {
        serde_json::from_value(value).map_err(|source| ClassificationError::Malformed {
            kind: "action",
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.action.name
    }

    pub fn input_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.input)
    }
}
