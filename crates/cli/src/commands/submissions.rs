//! Submission inspection.

use affidavit_core::CustomerId;
use affidavit_server::shopify::AdminClient;
use affidavit_server::store::{MetafieldStore, SubmissionStore};

use super::CliError;

/// Print a customer's stored submissions as pretty JSON.
///
/// # Errors
///
/// Returns a `Store` error if the metafield cannot be read.
#[allow(clippy::print_stdout)]
pub async fn show(client: AdminClient, customer: CustomerId) -> Result<(), CliError> {
    let store = MetafieldStore::new(client);
    let stored = store.load(customer).await?;

    tracing::info!(
        "Customer {}: {} submissions (version {})",
        customer,
        stored.records.len(),
        stored.version.token().unwrap_or("none")
    );
    println!("{}", serde_json::to_string_pretty(&stored.records)?);
    Ok(())
}
