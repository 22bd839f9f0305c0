//! # hasura-hooks transport
//!
//! HTTP endpoints in front of a [`HasuraService`](hasura_hooks_framework::HasuraService).
//!
//! ## Features
//!
//! - `http-server`: axum router with the event and action endpoints
//!
//! ## Endpoints
//!
//! | Route | Calls | Success |
//! |-------|-------|---------|
//! | `POST /{prefix}/events` | `HasuraService::handle_event` | `200` with the handler results |
//! | `POST /{prefix}/actions` | `HasuraService::handle_action` | `200` with the handler result |
//!
//! When a webhook secret is configured, requests without the matching
//! secret header are answered with `401` before reaching the service.
//! Dispatch failures map to `400` (unrecognized payload, no handler) or
//! `500` (handler error), with a `{"message": ...}` body.

pub mod error;

#[cfg(feature = "http-server")]
pub mod server;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-server")]
pub use server::{RouterOptions, router, serve};
