//! Submission store backed by a Shopify customer metafield.

use affidavit_core::{CustomerId, LegacyAffidavitStatus, SubmissionRecord};
use futures::future::BoxFuture;
use tracing::instrument;

use super::{StoreError, StoreVersion, StoredSubmissions, SubmissionStore};
use crate::shopify::{AdminClient, ShopifyError, WriteCondition};

/// Customer metafield key holding the submissions array.
pub const SUBMISSIONS_KEY: &str = "submissions";

/// Customer metafield key of the per-product-code legacy schema.
pub const LEGACY_KEY: &str = "approved_affidavits";

/// Stores each customer's submissions as a `json` metafield in the app
/// namespace, using `compareDigest` as the version.
#[derive(Clone)]
pub struct MetafieldStore {
    client: AdminClient,
}

impl MetafieldStore {
    #[must_use]
    pub const fn new(client: AdminClient) -> Self {
        Self { client }
    }

    /// Read the legacy per-product-code records. Missing means none.
    ///
    /// # Errors
    ///
    /// Returns `CustomerNotFound`, `Corrupt` for an unparseable value, or the
    /// backend error.
    #[instrument(skip(self), fields(customer_id = %customer))]
    pub async fn load_legacy(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<LegacyAffidavitStatus>, StoreError> {
        let snapshot = self
            .client
            .customer_metafield(customer, LEGACY_KEY)
            .await
            .map_err(|e| not_found_as_customer(e, customer))?;

        snapshot.value.map_or_else(
            || Ok(Vec::new()),
            |raw| {
                serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                    customer,
                    reason: e.to_string(),
                })
            },
        )
    }
}

fn not_found_as_customer(error: ShopifyError, customer: CustomerId) -> StoreError {
    match error {
        ShopifyError::NotFound(_) => StoreError::CustomerNotFound(customer),
        other => StoreError::Backend(other),
    }
}

impl SubmissionStore for MetafieldStore {
    fn load<'a>(&'a self, customer: CustomerId) -> BoxFuture<'a, Result<StoredSubmissions, StoreError>> {
        Box::pin(async move {
            let snapshot = self
                .client
                .customer_metafield(customer, SUBMISSIONS_KEY)
                .await
                .map_err(|e| not_found_as_customer(e, customer))?;

            let Some(raw) = snapshot.value else {
                return Ok(StoredSubmissions::default());
            };

            let records: Vec<SubmissionRecord> =
                serde_json::from_str(&raw).map_err(|e| {
                    tracing::error!(
                        customer_id = %customer,
                        error = %e,
                        "Stored submissions failed to parse"
                    );
                    StoreError::Corrupt {
                        customer,
                        reason: e.to_string(),
                    }
                })?;

            // An existing metafield always has a digest; without one the
            // next conditional write could never succeed.
            let digest = snapshot.compare_digest.ok_or_else(|| {
                StoreError::Backend(ShopifyError::UserError(
                    "submissions metafield has no compareDigest".to_string(),
                ))
            })?;

            Ok(StoredSubmissions {
                records,
                version: StoreVersion::new(digest),
            })
        })
    }

    fn save<'a>(
        &'a self,
        customer: CustomerId,
        records: &'a [SubmissionRecord],
        expected: &'a StoreVersion,
    ) -> BoxFuture<'a, Result<StoreVersion, StoreError>> {
        Box::pin(async move {
            let value = serde_json::to_string(records).map_err(|e| StoreError::Corrupt {
                customer,
                reason: e.to_string(),
            })?;

            let condition = expected
                .token()
                .map_or(WriteCondition::Absent, |d| WriteCondition::Digest(d.to_string()));

            let digest = self
                .client
                .set_app_metafield(customer.to_gid(), SUBMISSIONS_KEY, value, condition)
                .await
                .map_err(|e| match e {
                    ShopifyError::StaleObject(message) => {
                        tracing::debug!(customer_id = %customer, %message, "compareDigest mismatch");
                        StoreError::Conflict(customer)
                    }
                    other => not_found_as_customer(other, customer),
                })?;

            tracing::info!(
                customer_id = %customer,
                count = records.len(),
                "Saved submissions"
            );
            Ok(StoreVersion(digest))
        })
    }
}
