//! Metafield definition setup.
//!
//! Definitions make the metafields visible in the Shopify admin and, for the
//! app-reserved namespace, grant the access the storefront needs. Creating
//! them twice is harmless: existing definitions are reported and skipped.

use affidavit_server::platform::ORDER_REFERENCE_KEY;
use affidavit_server::shopify::{
    AdminClient, DefinitionOutcome, MetafieldDefinitionSpec, PRODUCT_NAMESPACE,
};
use affidavit_server::store::SUBMISSIONS_KEY;

use super::CliError;

/// Key of the product flag that turns gating on.
pub const REQUIRES_AFFIDAVIT_KEY: &str = "requires_affidavit";

/// Key of the product's gating codes.
pub const PRODUCT_CODES_KEY: &str = "product_codes";

/// Every definition the service relies on, for an app namespace.
#[must_use]
pub fn specs(app_namespace: &str) -> Vec<MetafieldDefinitionSpec> {
    let app_reserved = app_namespace.starts_with("app--");
    vec![
        MetafieldDefinitionSpec {
            name: "Requires affidavit",
            namespace: PRODUCT_NAMESPACE.to_string(),
            key: REQUIRES_AFFIDAVIT_KEY,
            description: "Orders for this product need an approved affidavit",
            kind: "boolean",
            owner_type: "PRODUCT",
            app_reserved: false,
        },
        MetafieldDefinitionSpec {
            name: "Affidavit product codes",
            namespace: PRODUCT_NAMESPACE.to_string(),
            key: PRODUCT_CODES_KEY,
            description: "Product codes an affidavit must cover to order this product",
            kind: "list.single_line_text_field",
            owner_type: "PRODUCT",
            app_reserved: false,
        },
        MetafieldDefinitionSpec {
            name: "Affidavit submissions",
            namespace: app_namespace.to_string(),
            key: SUBMISSIONS_KEY,
            description: "Affidavit submissions and their review status",
            kind: "json",
            owner_type: "CUSTOMER",
            app_reserved,
        },
        MetafieldDefinitionSpec {
            name: "Affidavit submission",
            namespace: app_namespace.to_string(),
            key: ORDER_REFERENCE_KEY,
            description: "Affidavit the order was gated on",
            kind: "json",
            owner_type: "ORDER",
            app_reserved,
        },
    ]
}

/// Create all metafield definitions.
///
/// # Errors
///
/// Returns the first Shopify error other than a duplicate definition.
pub async fn create(client: &AdminClient) -> Result<(), CliError> {
    for spec in specs(client.namespace()) {
        match client.create_metafield_definition(&spec).await? {
            DefinitionOutcome::Created(id) => {
                tracing::info!(
                    "Created {} {}.{} ({})",
                    spec.owner_type,
                    spec.namespace,
                    spec.key,
                    id
                );
            }
            DefinitionOutcome::AlreadyExists => {
                tracing::info!(
                    "Skipped {} {}.{} (already defined)",
                    spec.owner_type,
                    spec.namespace,
                    spec.key
                );
            }
        }
    }
    Ok(())
}
