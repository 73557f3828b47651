//! In-process submission store.

use std::collections::HashMap;

use affidavit_core::{CustomerId, SubmissionRecord};
use futures::future::BoxFuture;
use tokio::sync::RwLock;

use super::{StoreError, StoreVersion, StoredSubmissions, SubmissionStore};

#[derive(Debug, Clone)]
struct Entry {
    records: Vec<SubmissionRecord>,
    version: u64,
}

/// Keeps submissions in memory with a per-customer version counter.
///
/// Used by tests and local development without a store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CustomerId, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a customer's submissions unconditionally.
    pub async fn put(&self, customer: CustomerId, records: Vec<SubmissionRecord>) {
        let mut entries = self.entries.write().await;
        let version = entries.get(&customer).map_or(1, |e| e.version + 1);
        entries.insert(customer, Entry { records, version });
    }
}

impl SubmissionStore for MemoryStore {
    fn load<'a>(&'a self, customer: CustomerId) -> BoxFuture<'a, Result<StoredSubmissions, StoreError>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            Ok(entries
                .get(&customer)
                .map(|e| StoredSubmissions {
                    records: e.records.clone(),
                    version: StoreVersion::new(e.version.to_string()),
                })
                .unwrap_or_default())
        })
    }

    fn save<'a>(
        &'a self,
        customer: CustomerId,
        records: &'a [SubmissionRecord],
        expected: &'a StoreVersion,
    ) -> BoxFuture<'a, Result<StoreVersion, StoreError>> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            let current = entries.get(&customer).map(|e| e.version.to_string());
            if current.as_deref() != expected.token() {
                return Err(StoreError::Conflict(customer));
            }

            let version = entries.get(&customer).map_or(1, |e| e.version + 1);
            entries.insert(
                customer,
                Entry {
                    records: records.to_vec(),
                    version,
                },
            );
            Ok(StoreVersion::new(version.to_string()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_customer_is_empty_and_absent() {
        let store = MemoryStore::new();
        let stored = store.load(CustomerId::new(9)).await.unwrap();
        assert!(stored.records.is_empty());
        assert_eq!(stored.version, StoreVersion::absent());
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = MemoryStore::new();
        let customer = CustomerId::new(9);

        let v1 = store.save(customer, &[], &StoreVersion::absent()).await.unwrap();
        store.save(customer, &[], &v1).await.unwrap();

        let err = store.save(customer, &[], &v1).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store
            .save(customer, &[], &StoreVersion::absent())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
