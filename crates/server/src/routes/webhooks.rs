//! Shopify webhook handlers.
//!
//! Shopify retries any non-2xx delivery, so failures past signature and
//! payload checks are logged and acknowledged rather than bounced back.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::OrderPayload;
use crate::state::AppState;

/// `orders/create`: run the order gate.
#[instrument(skip(state, body))]
pub async fn orders_create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>)> {
    let order: OrderPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed orders/create payload");
        AppError::BadRequest(format!("Malformed order payload: {e}"))
    })?;

    match state.gate().handle(&order, Utc::now()).await {
        Ok(decision) => {
            tracing::info!(order_id = %order.id, decision = decision.as_str(), "Order gated");
            Ok((
                StatusCode::OK,
                Json(json!({ "success": true, "decision": decision.as_str() })),
            ))
        }
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                order_id = %order.id,
                error = %e,
                sentry_event_id = %event_id,
                "Order gate failed"
            );
            Ok((
                StatusCode::OK,
                Json(json!({ "success": false, "error": "Order gate failed" })),
            ))
        }
    }
}
