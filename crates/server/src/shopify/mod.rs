//! Shopify Admin API client.
//!
//! # Architecture
//!
//! - GraphQL operations implement `graphql_client::GraphQLQuery` (see [`queries`])
//! - HTTP through `reqwest` with the custom app's Admin API access token
//! - No local persistence: customer, product and order metafields are the
//!   only storage the service has
//!
//! # Example
//!
//! ```rust,ignore
//! use affidavit_server::shopify::AdminClient;
//!
//! let client = AdminClient::new(&config.shopify);
//! let contact = client.customer_contact(CustomerId::new(42)).await?;
//! ```

mod client;
pub mod queries;

pub use client::{
    AdminClient, DefinitionOutcome, MetafieldDefinitionSpec, MetafieldSnapshot, PRODUCT_NAMESPACE,
    WriteCondition,
};

use thiserror::Error;

use queries::UserError;

/// Errors that can occur when interacting with the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User error from mutation (e.g., invalid input).
    #[error("User error: {0}")]
    UserError(String),

    /// A conditional metafield write lost against a concurrent writer.
    #[error("Stale object: {0}")]
    StaleObject(String),
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Turn mutation `userErrors` into an error, if there are any.
///
/// A `STALE_OBJECT` code (failed `compareDigest`) becomes
/// [`ShopifyError::StaleObject`].
pub(crate) fn check_user_errors(errors: &[UserError]) -> Result<(), ShopifyError> {
    if errors.is_empty() {
        return Ok(());
    }

    let message = errors
        .iter()
        .map(|e| {
            let field = e.field.as_ref().map_or_else(String::new, |f| f.join("."));
            format!("{}: {}", field, e.message)
        })
        .collect::<Vec<_>>()
        .join("; ");

    if errors
        .iter()
        .any(|e| e.code.as_deref() == Some("STALE_OBJECT"))
    {
        return Err(ShopifyError::StaleObject(message));
    }
    Err(ShopifyError::UserError(message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user_error(message: &str, code: Option<&str>) -> UserError {
        UserError {
            field: Some(vec!["metafields".to_string(), "0".to_string()]),
            message: message.to_string(),
            code: code.map(String::from),
        }
    }

    #[test]
    fn test_graphql_error_formatting() {
        let err = ShopifyError::GraphQL(vec![
            GraphQLError {
                message: "Field not found".to_string(),
                path: vec![],
            },
            GraphQLError {
                message: "Invalid ID".to_string(),
                path: vec![],
            },
        ]);
        assert_eq!(err.to_string(), "GraphQL errors: Field not found; Invalid ID");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(2);
        assert_eq!(err.to_string(), "Rate limited, retry after 2 seconds");
    }

    #[test]
    fn test_check_user_errors() {
        assert!(check_user_errors(&[]).is_ok());

        let err = check_user_errors(&[user_error("Value is invalid", None)]).unwrap_err();
        assert_eq!(err.to_string(), "User error: metafields.0: Value is invalid");

        let err = check_user_errors(&[user_error("Stale", Some("STALE_OBJECT"))]).unwrap_err();
        assert!(matches!(err, ShopifyError::StaleObject(_)));
    }
}
