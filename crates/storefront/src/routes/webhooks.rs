//! Payment provider webhook endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::webhooks::WebhookService;
use crate::state::AppState;

/// Header carrying the provider's signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verify and apply a provider event.
///
/// Only a failed signature check is rejected (400). Once the body is
/// authenticated the provider always gets `200 {"received": true}`; failures
/// past that point are logged and reported to Sentry. A failed event stays
/// out of the ledger, so resending it from the provider reprocesses it.
#[tracing::instrument(skip_all)]
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Webhook without signature header");
        return reject("Missing signature");
    };

    match state.webhook_verifier().verify(&body, signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Webhook signature mismatch");
            return reject("Invalid signature");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook signature");
            return reject("Invalid signature");
        }
    }

    match WebhookService::new(state.stores()).handle_payload(&body).await {
        Ok(outcome) => tracing::info!(?outcome, "Webhook processed"),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "Webhook processing failed");
        }
    }

    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

fn reject(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
