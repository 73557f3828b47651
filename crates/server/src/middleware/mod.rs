//! HTTP middleware.

pub mod request_id;
pub mod webhook;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use webhook::{SHOPIFY_HMAC_HEADER, verify_shopify_webhook};
