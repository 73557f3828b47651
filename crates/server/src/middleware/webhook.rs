//! Shopify webhook signature verification.
//!
//! Shopify signs each webhook body with the app's secret and sends the
//! base64 HMAC-SHA256 in `X-Shopify-Hmac-Sha256`. The body must be verified
//! byte for byte before it is parsed.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::AppError;
use crate::routes::MAX_BODY_BYTES;
use crate::state::AppState;

/// Header carrying the webhook signature.
pub const SHOPIFY_HMAC_HEADER: &str = "x-shopify-hmac-sha256";

type HmacSha256 = Hmac<Sha256>;

/// Whether `signature` (base64) is the HMAC of `body` under `secret`.
/// Constant time.
#[must_use]
pub fn signature_matches(secret: &SecretString, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Rejects webhook requests whose signature does not match the body.
pub async fn verify_shopify_webhook(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let Some(signature) = parts
        .headers
        .get(SHOPIFY_HMAC_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
    else {
        tracing::warn!(path = %parts.uri.path(), "Webhook without signature");
        return AppError::Unauthorized("Missing webhook signature".to_string()).into_response();
    };

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::BadRequest(format!("Unreadable body: {e}")).into_response();
        }
    };

    if !signature_matches(state.webhook_secret(), &bytes, &signature) {
        tracing::warn!(path = %parts.uri.path(), "Webhook signature mismatch");
        return AppError::Unauthorized("Invalid webhook signature".to_string()).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
