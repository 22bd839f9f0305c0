//! Procedural macros for hasura-hooks.
//!
//! This crate provides:
//!
//! - `#[event_handler(...)]` - registers an async fn as an event handler
//! - `#[action_handler(...)]` - registers an async fn as an action handler
//!
//! Both macros leave the function unchanged and append a static registry
//! entry to a `linkme` distributed slice. The generated code refers to the
//! `hasura_hooks` facade crate, so applications depend on that crate rather
//! than on this one directly.

mod handler;

use proc_macro::TokenStream;

/// Registers an async function as a Hasura event handler.
///
/// # Attributes
///
/// - `trigger = "..."` - name of the event trigger (or cron trigger) to handle
/// - `table = "..."` - table whose events to handle (deprecated binding style)
/// - `schema = "..."` - schema of `table` (default: `public`)
///
/// At least one of `trigger` and `table` is required. Binding both registers
/// the handler under both keys, so events matching both are delivered twice.
///
/// The function takes one argument implementing `FromPayload`
/// (`TableEvent`, `ScheduledEvent`, `EventPayload` or `Arc<EventPayload>`)
/// and returns `()`, a `serde_json::Value`, an `Option<T>` or a
/// `Result<T, E>` with `T: Serialize`.
///
/// # Example
///
/// ```rust,ignore
/// use hasura_hooks::prelude::*;
///
/// #[event_handler(trigger = "user_created")]
/// async fn welcome(event: TableEvent) -> anyhow::Result<()> {
///     let user: User = event.new_row()?.unwrap_or_default();
///     send_welcome_mail(&user).await
/// }
/// ```
#[proc_macro_attribute]
pub fn event_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    handler::event_handler(attr, item)
}

/// Registers an async function as a Hasura action handler.
///
/// # Attributes
///
/// - `name = "..."` - action name (default: the function name)
///
/// The first parameter receives the action input, deserialized into any
/// `DeserializeOwned` type. It may be followed by `Arc<ActionPayload>` and
/// then `Arc<HeaderMap>`.
///
/// # Example
///
/// ```rust,ignore
/// use hasura_hooks::prelude::*;
///
/// #[action_handler(name = "login")]
/// async fn login(input: LoginInput, action: Arc<ActionPayload>) -> Result<LoginOutput, AuthError> {
///     authenticate(&input, action.session_variables.role()).await
/// }
/// ```
#[proc_macro_attribute]
pub fn action_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    handler::action_handler(attr, item)
}
