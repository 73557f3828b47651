//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                   - Liveness check
//!
//! # Storefront API
//! POST /api/affidavits/submit                    - File an affidavit (multipart or urlencoded)
//! GET  /api/affidavits/check                     - Approval status for product codes
//! GET  /api/affidavits/{id}/pdf                  - Affidavit PDF (owner only)
//!
//! # Reviewer (signed link)
//! GET  /review/{customer_id}/{submission_id}     - Review page
//! POST /api/orders/affidavit-approve             - Approve a submission
//! POST /api/orders/affidavit-reject              - Reject a submission
//!
//! # Shopify webhooks (HMAC verified)
//! POST /api/webhooks/orders/create               - Order gate
//! ```

pub mod affidavits;
pub mod review;
pub mod webhooks;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{request_id_middleware, verify_shopify_webhook};
use crate::state::AppState;

/// Request body limit. Signatures and attachments arrive inline.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Storefront-facing affidavit API.
pub fn affidavit_routes() -> Router<AppState> {
    Router::new()
        .route("/submit", post(affidavits::submit))
        .route("/check", get(affidavits::check))
        .route("/{id}/pdf", get(affidavits::pdf))
}

/// Reviewer decision endpoints.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/affidavit-approve", post(review::approve))
        .route("/affidavit-reject", post(review::reject))
}

/// Shopify webhooks, behind signature verification.
pub fn webhook_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders/create", post(webhooks::orders_create))
        .route_layer(middleware::from_fn_with_state(state, verify_shopify_webhook))
}

/// All routes with request-scoped layers applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/review/{customer_id}/{submission_id}",
            get(review::review_page),
        )
        .nest("/api/affidavits", affidavit_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/webhooks", webhook_routes(state.clone()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
