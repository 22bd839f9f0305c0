//! axum router for the webhook endpoints.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use http::{HeaderMap, HeaderName, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use hasura_hooks_core::DispatchError;
use hasura_hooks_framework::HasuraService;

use crate::error::{TransportError, TransportResult};

/// Settings for [`router`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Path prefix, with or without surrounding slashes.
    pub prefix: String,
    /// Header carrying the shared webhook secret.
    pub secret_header: String,
    /// Expected secret; `None` accepts every request.
    pub secret: Option<String>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            prefix: "hasura".to_string(),
            secret_header: "x-hasura-webhook-secret".to_string(),
            secret: None,
        }
    }
}

struct SecretGuard {
    header: HeaderName,
    secret: String,
}

impl SecretGuard {
    fn allows(&self, headers: &HeaderMap) -> bool {
        headers
            .get(&self.header)
            .is_some_and(|value| constant_time_eq(value.as_bytes(), self.secret.as_bytes()))
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

struct AppState {
    service: HasuraService,
    guard: Option<SecretGuard>,
}

impl AppState {
    fn reject_unauthorized(&self, headers: &HeaderMap) -> Option<Response> {
        let guard = self.guard.as_ref()?;
        if guard.allows(headers) {
            return None;
        }
        warn!(header = %guard.header, "Rejected webhook request with missing or wrong secret");
        Some(message(StatusCode::UNAUTHORIZED, "unauthorized"))
    }
}

/// Builds the router serving `POST /{prefix}/events` and
/// `POST /{prefix}/actions`.
pub fn router(service: HasuraService, options: RouterOptions) -> TransportResult<Router> {
    let prefix = options.prefix.trim_matches('/');
    if prefix.is_empty() {
        return Err(TransportError::InvalidPrefix(options.prefix.clone()));
    }

    let guard = match options.secret {
        Some(secret) => {
            let header = HeaderName::from_bytes(options.secret_header.as_bytes())
                .map_err(|_| TransportError::InvalidHeaderName(options.secret_header.clone()))?;
            Some(SecretGuard { header, secret })
        }
        None => {
            warn!("No webhook secret configured, accepting unauthenticated requests");
            None
        }
    };

    let events_path = format!("/{prefix}/events");
    let actions_path = format!("/{prefix}/actions");
    info!(events = %events_path, actions = %actions_path, "Mounting Hasura webhook routes");

    let state = Arc::new(AppState { service, guard });
    Ok(Router::new()
        .route(&events_path, post(event_handler))
        .route(&actions_path, post(action_handler))
        .with_state(state))
}

/// Serves `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> TransportResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn event_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(rejection) = state.reject_unauthorized(&headers) {
        return rejection;
    }
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(rejection) => return rejection,
    };

    match state.service.handle_event(payload).await {
        Ok(results) => Json(results).into_response(),
        Err(err) => dispatch_failure(err),
    }
}

async fn action_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(rejection) = state.reject_unauthorized(&headers) {
        return rejection;
    }
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(rejection) => return rejection,
    };

    match state.service.handle_action(payload, headers).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => dispatch_failure(err),
    }
}

fn parse_body(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "Request body is not JSON");
        message(StatusCode::BAD_REQUEST, &format!("invalid JSON body: {err}"))
    })
}

/// Client errors are reported as `400`, handler failures as `500`.
fn dispatch_failure(err: DispatchError) -> Response {
    if err.is_client_error() {
        warn!(error = %err, "Rejected webhook request");
        message(StatusCode::BAD_REQUEST, &err.to_string())
    } else {
        error!(error = %err, "Webhook handler failed");
        message(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
    }
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}
