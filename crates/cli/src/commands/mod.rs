//! CLI command implementations.

pub mod definitions;
pub mod legacy;
pub mod product;
pub mod submissions;

use affidavit_server::config::{ConfigError, ShopifyConfig};
use affidavit_server::shopify::{AdminClient, ShopifyError};
use affidavit_server::store::StoreError;
use thiserror::Error;

/// Errors a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Environment is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Shopify API call failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// Reading or writing submissions failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad command-line input.
    #[error("{0}")]
    Invalid(String),
}

/// Build an Admin API client from the environment (`.env` honored).
///
/// # Errors
///
/// Returns `Config` if the Shopify variables are missing or invalid.
pub fn admin_client() -> Result<AdminClient, CliError> {
    dotenvy::dotenv().ok();
    let config = ShopifyConfig::from_env()?;
    Ok(AdminClient::new(&config))
}
