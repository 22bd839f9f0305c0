//! Error taxonomy for handler registration and dispatch.
//!
//! - [`ConfigurationError`] is raised while building handler tables and is
//!   fatal: a process with an invalid table must not accept traffic.
//! - [`ClassificationError`], [`HandlerNotFoundError`] and handler failures
//!   are per-request and are surfaced to the caller through [`DispatchError`].

use thiserror::Error;

use crate::routing::{RoutingKey, join_keys};

/// A type-erased error returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid handler metadata discovered at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// An event handler declares neither a trigger name nor a table.
    #[error("event handler `{owner}::{method}` declares neither a trigger name nor a table")]
    MissingBinding {
        /// Declaring module of the handler.
        owner: String,
        /// Handler function name.
        method: String,
    },

    /// An action handler is registered under an empty name.
    #[error("action handler `{owner}::{method}` has an empty action name")]
    EmptyActionName { owner: String, method: String },

    /// Two action handlers claim the same action name.
    #[error("action `{name}` is handled by both `{first}` and `{second}`")]
    DuplicateAction {
        name: String,
        first: String,
        second: String,
    },
}

/// A payload that is not a recognizable Hasura event.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// The payload matches none of the known event shapes.
    #[error("payload is not a recognized Hasura event")]
    Unrecognized,

    /// The payload has the shape of a known kind but its fields do not decode.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// No handler is registered for a classified event or action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerNotFoundError {
    #[error("no event handler registered for keys [{}]", join_keys(.keys))]
    Event { keys: Vec<RoutingKey> },

    #[error("no action handler registered for `{name}`")]
    Action { name: String },
}

/// A handler argument could not be produced from the incoming payload.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The handler expects a different kind of event.
    #[error("handler expects a {expected}, got a {got}")]
    KindMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// Action input does not deserialize into the handler's input type.
    #[error("failed to decode action input: {0}")]
    Input(#[from] serde_json::Error),
}

/// Failure of a single dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    HandlerNotFound(#[from] HandlerNotFoundError),

    /// A matched handler failed. The handler's error is carried as-is.
    #[error("{0}")]
    Handler(BoxError),
}

impl DispatchError {
    /// Returns `true` for failures caused by the request rather than by a
    /// handler: unrecognized payloads and payloads nothing is registered for.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Classification(_) | Self::HandlerNotFound(_))
    }

    /// Returns the handler's own error, if this failure came from a handler.
    pub fn into_handler_error(self) -> Option<BoxError> {
        match self {
            Self::Handler(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_keys() {
        let err = HandlerNotFoundError::Event {
            keys: vec![RoutingKey::from("t1"), RoutingKey::from("public-users")],
        };
        assert_eq!(
            err.to_string(),
            "no event handler registered for keys [t1, public-users]"
        );
    }

    #[test]
    fn test_client_error_classes() {
        let not_found: DispatchError = HandlerNotFoundError::Action {
            name: "login".into(),
        }
        .into();
        assert!(not_found.is_client_error());
        assert!(DispatchError::from(ClassificationError::Unrecognized).is_client_error());

        let handler = DispatchError::Handler("boom".into());
        assert!(!handler.is_client_error());
        assert_eq!(handler.to_string(), "boom");
        assert_eq!(handler.into_handler_error().unwrap().to_string(), "boom");
    }
}
