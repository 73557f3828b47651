//! Submission storage.
//!
//! Each customer's submissions are one JSON document. Writes are conditional
//! on the version that was read, so two concurrent read-modify-write cycles
//! cannot silently drop each other's changes: the loser gets
//! [`StoreError::Conflict`] and [`update_submissions`] re-applies its change
//! on a fresh read.

mod memory;
mod metafield;

pub use memory::MemoryStore;
pub use metafield::{LEGACY_KEY, MetafieldStore, SUBMISSIONS_KEY};

use affidavit_core::{CustomerId, SubmissionRecord};
use futures::future::BoxFuture;
use thiserror::Error;

use crate::shopify::ShopifyError;

/// How many times a conflicting write is retried before giving up.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Errors from the submission store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document changed since it was read.
    #[error("Submissions for customer {0} were modified concurrently")]
    Conflict(CustomerId),

    /// The stored document could not be parsed.
    #[error("Stored submissions for customer {customer} are corrupt: {reason}")]
    Corrupt { customer: CustomerId, reason: String },

    /// The customer does not exist.
    #[error("Customer {0} not found")]
    CustomerNotFound(CustomerId),

    /// The backing platform failed.
    #[error("Store backend error: {0}")]
    Backend(#[from] ShopifyError),
}

/// Opaque token identifying the document version that was read.
///
/// `StoreVersion::absent()` means no document existed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreVersion(Option<String>);

impl StoreVersion {
    /// Version of a document that does not exist yet.
    #[must_use]
    pub const fn absent() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// The token, or `None` for an absent document.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// A customer's submissions as read, with their version.
#[derive(Debug, Clone, Default)]
pub struct StoredSubmissions {
    pub records: Vec<SubmissionRecord>,
    pub version: StoreVersion,
}

/// Per-customer submission document storage.
pub trait SubmissionStore: Send + Sync {
    /// Read a customer's submissions. A missing document is an empty list.
    fn load<'a>(&'a self, customer: CustomerId) -> BoxFuture<'a, Result<StoredSubmissions, StoreError>>;

    /// Replace a customer's submissions if the stored version still equals
    /// `expected`. Returns the new version.
    fn save<'a>(
        &'a self,
        customer: CustomerId,
        records: &'a [SubmissionRecord],
        expected: &'a StoreVersion,
    ) -> BoxFuture<'a, Result<StoreVersion, StoreError>>;
}

/// Read-modify-write a customer's submissions.
///
/// `apply` gets the current records and returns either the new records with
/// a value to hand back, or `None` to leave storage untouched. On a write
/// conflict the document is re-read and `apply` runs again, up to
/// [`MAX_WRITE_ATTEMPTS`] times in total.
///
/// # Errors
///
/// Returns the error from `apply`, or a [`StoreError`] (including
/// `Conflict` once attempts are exhausted).
pub async fn update_submissions<S, T, E, F>(
    store: &S,
    customer: CustomerId,
    mut apply: F,
) -> Result<Option<T>, E>
where
    S: SubmissionStore + ?Sized,
    E: From<StoreError>,
    F: FnMut(&[SubmissionRecord]) -> Result<Option<(Vec<SubmissionRecord>, T)>, E>,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let current = store.load(customer).await?;

        let Some((records, value)) = apply(&current.records)? else {
            return Ok(None);
        };

        match store.save(customer, &records, &current.version).await {
            Ok(_) => return Ok(Some(value)),
            Err(StoreError::Conflict(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                tracing::warn!(
                    customer_id = %customer,
                    attempt,
                    "Submission write conflict, retrying"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StoreError::Conflict(customer).into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use affidavit_core::{ProductCodes, SubmissionId};
    use chrono::Utc;

    use super::*;

    fn record(id: &str) -> SubmissionRecord {
        SubmissionRecord::pending(
            SubmissionId::parse(id).unwrap(),
            ProductCodes::parse_delimited("A123"),
            Utc::now(),
            None,
        )
        .unwrap()
    }

    /// Lets another writer slip in before the first `conflicts` saves.
    struct RacingStore {
        inner: MemoryStore,
        conflicts: AtomicUsize,
    }

    impl SubmissionStore for RacingStore {
        fn load<'a>(
            &'a self,
            customer: CustomerId,
        ) -> BoxFuture<'a, Result<StoredSubmissions, StoreError>> {
            self.inner.load(customer)
        }

        fn save<'a>(
            &'a self,
            customer: CustomerId,
            records: &'a [SubmissionRecord],
            expected: &'a StoreVersion,
        ) -> BoxFuture<'a, Result<StoreVersion, StoreError>> {
            Box::pin(async move {
                if self.conflicts.load(Ordering::SeqCst) > 0 {
                    self.conflicts.fetch_sub(1, Ordering::SeqCst);
                    let mut theirs = self.inner.load(customer).await?.records;
                    theirs.push(record(&format!("rival-{}", theirs.len())));
                    self.inner.put(customer, theirs).await;
                }
                self.inner.save(customer, records, expected).await
            })
        }
    }

    fn append(id: &'static str) -> impl FnMut(&[SubmissionRecord]) -> Result<Option<(Vec<SubmissionRecord>, ())>, StoreError> {
        move |records| {
            let mut next = records.to_vec();
            next.push(record(id));
            Ok(Some((next, ())))
        }
    }

    #[tokio::test]
    async fn test_update_writes_once() {
        let store = MemoryStore::new();
        let customer = CustomerId::new(1);

        update_submissions(&store, customer, append("mine")).await.unwrap();

        let stored = store.load(customer).await.unwrap();
        assert_eq!(stored.records.len(), 1);
        assert_ne!(stored.version, StoreVersion::absent());
    }

    #[tokio::test]
    async fn test_conflict_is_retried_without_losing_rival_write() {
        let store = RacingStore {
            inner: MemoryStore::new(),
            conflicts: AtomicUsize::new(1),
        };
        let customer = CustomerId::new(2);

        update_submissions(&store, customer, append("mine")).await.unwrap();

        let ids: Vec<_> = store
            .inner
            .load(customer)
            .await
            .unwrap()
            .records
            .iter()
            .map(|r| r.id().as_str().to_owned())
            .collect();
        assert_eq!(ids, ["rival-0", "mine"]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = RacingStore {
            inner: MemoryStore::new(),
            conflicts: AtomicUsize::new(MAX_WRITE_ATTEMPTS),
        };
        let customer = CustomerId::new(3);

        let err = update_submissions(&store, customer, append("mine"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c == customer));
    }

    #[tokio::test]
    async fn test_no_change_skips_write() {
        let store = MemoryStore::new();
        let customer = CustomerId::new(4);

        let result: Option<()> = update_submissions(&store, customer, |_| Ok::<_, StoreError>(None))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(
            store.load(customer).await.unwrap().version,
            StoreVersion::absent()
        );
    }
}
