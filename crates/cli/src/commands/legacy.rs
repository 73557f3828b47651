//! Migration from the per-product-code schema.
//!
//! The old `approved_affidavits` metafield held one row per product code.
//! Rows are grouped back into submissions and merged into `submissions`;
//! records whose id is already stored are left alone, so the command can be
//! re-run safely.

use std::collections::HashSet;

use affidavit_core::{CustomerId, SubmissionId, SubmissionRecord, migrate_legacy};
use affidavit_server::shopify::AdminClient;
use affidavit_server::store::{MetafieldStore, SubmissionStore, update_submissions};

use super::CliError;

/// Migrated records not yet present in `existing`.
#[must_use]
pub fn missing_records(
    existing: &[SubmissionRecord],
    migrated: &[SubmissionRecord],
) -> Vec<SubmissionRecord> {
    let stored: HashSet<&SubmissionId> = existing.iter().map(SubmissionRecord::id).collect();
    migrated
        .iter()
        .filter(|r| !stored.contains(r.id()))
        .cloned()
        .collect()
}

/// Merge a customer's legacy records into their submissions.
///
/// # Errors
///
/// Returns a `Store` error if either metafield cannot be read or the write
/// keeps conflicting.
pub async fn migrate(
    client: AdminClient,
    customer: CustomerId,
    dry_run: bool,
) -> Result<(), CliError> {
    let store = MetafieldStore::new(client);

    let legacy = store.load_legacy(customer).await?;
    if legacy.is_empty() {
        tracing::info!("Customer {} has no legacy affidavit records", customer);
        return Ok(());
    }
    let migrated = migrate_legacy(&legacy);
    tracing::info!(
        "Customer {}: {} legacy rows form {} submissions",
        customer,
        legacy.len(),
        migrated.len()
    );

    if dry_run {
        let current = store.load(customer).await?;
        let missing = missing_records(&current.records, &migrated);
        for record in &missing {
            tracing::info!(
                "Would add {} [{}] {}",
                record.id(),
                record.product_codes().join(", "),
                record.status().kind()
            );
        }
        tracing::info!("Dry run: {} submissions would be added", missing.len());
        return Ok(());
    }

    let added = update_submissions(&store, customer, |existing| {
        let missing = missing_records(existing, &migrated);
        if missing.is_empty() {
            return Ok::<_, CliError>(None);
        }
        let count = missing.len();
        let mut records = existing.to_vec();
        records.extend(missing);
        Ok(Some((records, count)))
    })
    .await?;

    match added {
        Some(count) => tracing::info!("Added {} submissions for customer {}", count, customer),
        None => tracing::info!("Customer {} is already migrated", customer),
    }
    Ok(())
}
