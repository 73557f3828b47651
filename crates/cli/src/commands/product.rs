//! Product gating.

use affidavit_core::{ProductCodes, ProductId};
use affidavit_server::shopify::{AdminClient, PRODUCT_NAMESPACE, WriteCondition};

use super::CliError;
use super::definitions::{PRODUCT_CODES_KEY, REQUIRES_AFFIDAVIT_KEY};

/// Require an affidavit covering `codes` for `product`.
///
/// # Errors
///
/// Returns `Invalid` when `codes` holds no product code, or the Shopify
/// error.
pub async fn gate(client: &AdminClient, product: ProductId, codes: &str) -> Result<(), CliError> {
    let codes = ProductCodes::parse_delimited(codes);
    if codes.is_empty() {
        return Err(CliError::Invalid(
            "at least one product code is required".to_string(),
        ));
    }

    client
        .set_metafield(
            product.to_gid(),
            PRODUCT_NAMESPACE,
            PRODUCT_CODES_KEY,
            "list.single_line_text_field",
            serde_json::to_string(&codes)?,
            WriteCondition::Unchecked,
        )
        .await?;
    client
        .set_metafield(
            product.to_gid(),
            PRODUCT_NAMESPACE,
            REQUIRES_AFFIDAVIT_KEY,
            "boolean",
            "true".to_string(),
            WriteCondition::Unchecked,
        )
        .await?;

    tracing::info!("Product {} now requires an affidavit for {}", product, codes.join(", "));
    Ok(())
}

/// Stop requiring an affidavit for `product`. Its codes are kept.
///
/// # Errors
///
/// Returns the Shopify error.
pub async fn ungate(client: &AdminClient, product: ProductId) -> Result<(), CliError> {
    client
        .set_metafield(
            product.to_gid(),
            PRODUCT_NAMESPACE,
            REQUIRES_AFFIDAVIT_KEY,
            "boolean",
            "false".to_string(),
            WriteCondition::Unchecked,
        )
        .await?;

    tracing::info!("Product {} no longer requires an affidavit", product);
    Ok(())
}
