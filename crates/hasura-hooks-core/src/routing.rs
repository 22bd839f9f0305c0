//! Routing keys and event handler bindings.
//!
//! Every event handler is bound to one or two [`RoutingKey`]s: the name of a
//! Hasura event trigger, and/or a `{schema}-{table}` key derived from the
//! table the trigger is attached to. Incoming events are classified into the
//! same key space, so a binding fires when any of its keys matches any of the
//! event's candidate keys.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Schema assumed when a table reference does not name one.
pub const DEFAULT_SCHEMA: &str = "public";

/// A derived key used to look up event handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingKey(String);

impl RoutingKey {
    /// Key for an event trigger, which is the trigger name itself.
    pub fn for_trigger(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Key for a table: `"{schema}-{name}"`, with the schema defaulting to
    /// [`DEFAULT_SCHEMA`].
    pub fn for_table(schema: Option<&str>, name: &str) -> Self {
        Self(format!("{}-{}", schema.unwrap_or(DEFAULT_SCHEMA), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoutingKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoutingKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for RoutingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Joins keys for display in errors and logs.
pub(crate) fn join_keys(keys: &[RoutingKey]) -> String {
    keys.iter()
        .map(RoutingKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A table an event handler is bound to.
///
/// Uses `Cow<'static, str>` so bindings can be built in a `static` by the
/// `#[event_handler]` macro and at runtime from owned strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<Cow<'static, str>>,
    pub name: Cow<'static, str>,
}

impl TableRef {
    /// Creates a table reference from static strings.
    pub const fn new(schema: Option<&'static str>, name: &'static str) -> Self {
        Self {
            schema: match schema {
                Some(schema) => Some(Cow::Borrowed(schema)),
                None => None,
            },
            name: Cow::Borrowed(name),
        }
    }

    /// Creates a table reference from owned parts.
    pub fn from_parts(schema: Option<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(Cow::Owned),
            name: Cow::Owned(name.into()),
        }
    }

    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::for_table(self.schema.as_deref(), &self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA),
            self.name
        )
    }
}

/// Binding metadata declared on an event handler.
///
/// At least one of `trigger_name` and `table` must be set; the table
/// builder rejects bindings with neither. Setting both registers the
/// handler under both keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBindingConfig {
    pub trigger_name: Option<Cow<'static, str>>,
    pub table: Option<TableRef>,
}

impl EventBindingConfig {
    /// A binding with neither trigger nor table.
    pub const EMPTY: Self = Self {
        trigger_name: None,
        table: None,
    };

    /// Binds to an event trigger by name.
    pub const fn trigger(name: &'static str) -> Self {
        Self {
            trigger_name: Some(Cow::Borrowed(name)),
            table: None,
        }
    }

    /// Binds to every trigger on a table.
    pub const fn table(table: TableRef) -> Self {
        Self {
            trigger_name: None,
            table: Some(table),
        }
    }

    pub fn with_trigger(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.trigger_name = Some(name.into());
        self
    }

    pub fn with_table(mut self, table: TableRef) -> Self {
        self.table = Some(table);
        self
    }

    /// Returns `true` if neither a trigger nor a table is set.
    pub fn is_empty(&self) -> bool {
        self.trigger_name.is_none() && self.table.is_none()
    }

    /// Returns `true` if both a trigger and a table are set.
    pub fn is_dual(&self) -> bool {
        self.trigger_name.is_some() && self.table.is_some()
    }

    /// Routing keys for this binding, trigger key first.
    pub fn routing_keys(&self) -> Vec<RoutingKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(trigger) = &self.trigger_name {
            keys.push(RoutingKey::for_trigger(trigger));
        }
        if let Some(table) = &self.table {
            keys.push(table.routing_key());
        }
        keys
    }
}
