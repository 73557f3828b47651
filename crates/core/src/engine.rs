//! Affidavit state engine.
//!
//! Pure functions over a customer's submission list. Nothing here performs
//! I/O: callers load a snapshot, apply one of these functions, and persist the
//! snapshot they get back.
//!
//! Lifecycle of one record:
//!
//! ```text
//! (absent) --submit--> Pending --approve--> Approved (expires after 365 days)
//!                         \------reject---> Rejected
//! ```
//!
//! Approved and rejected records are terminal. Expiry is evaluated on read and
//! never written back.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::{
    AffidavitForm, ProductCode, ProductCodes, RecordError, SubmissionId, SubmissionRecord,
    SubmissionStatus,
};

/// How long an approval stays in force.
pub const APPROVAL_VALIDITY_DAYS: i64 = 365;

/// Result of checking a batch of product codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheck {
    /// `true` when no code is missing.
    pub valid: bool,
    /// Codes with an approval in force, in query order.
    pub valid_for: Vec<ProductCode>,
    /// Codes without one, in query order.
    pub missing: Vec<ProductCode>,
}

/// A new snapshot after a submission.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub records: Vec<SubmissionRecord>,
    pub record: SubmissionRecord,
}

/// A new snapshot after a review decision.
#[derive(Debug, Clone)]
pub struct Applied {
    pub records: Vec<SubmissionRecord>,
    pub record: SubmissionRecord,
}

/// Whether `code` is covered by an approval still in force at `now`.
#[must_use]
pub fn is_valid_for(records: &[SubmissionRecord], code: &ProductCode, now: DateTime<Utc>) -> bool {
    records
        .iter()
        .any(|r| r.product_codes().contains(code) && r.status().is_active_approval(now))
}

/// Check every code in `codes` independently.
#[must_use]
pub fn check_batch(
    records: &[SubmissionRecord],
    codes: &ProductCodes,
    now: DateTime<Utc>,
) -> BatchCheck {
    let (valid_for, missing): (Vec<_>, Vec<_>) = codes
        .iter()
        .cloned()
        .partition(|code| is_valid_for(records, code, now));

    BatchCheck {
        valid: missing.is_empty(),
        valid_for,
        missing,
    }
}

/// Pending records sharing at least one code with `codes`, in stored order.
pub fn pending_covering<'a>(
    records: &'a [SubmissionRecord],
    codes: &'a ProductCodes,
) -> impl Iterator<Item = &'a SubmissionRecord> + 'a {
    records
        .iter()
        .filter(move |r| r.status().is_pending() && r.covers_any(codes))
}

/// Whether any pending record shares a code with `codes`.
#[must_use]
pub fn has_pending(records: &[SubmissionRecord], codes: &ProductCodes) -> bool {
    pending_covering(records, codes).next().is_some()
}

/// Look up a record by id.
#[must_use]
pub fn find<'a>(records: &'a [SubmissionRecord], id: &SubmissionId) -> Option<&'a SubmissionRecord> {
    records.iter().find(|r| r.id() == id)
}

/// Append a new pending submission with a fresh id.
///
/// # Errors
///
/// Returns [`RecordError::EmptyProductCodes`] if `codes` is empty.
pub fn submit(
    records: &[SubmissionRecord],
    codes: ProductCodes,
    form: AffidavitForm,
    now: DateTime<Utc>,
) -> Result<Submitted, RecordError> {
    submit_with_id(records, SubmissionId::generate(), codes, form, now)
}

/// Append a new pending submission under a caller-chosen id.
///
/// Existing records are neither modified nor reordered. No duplicate check is
/// made: a customer may have several pending filings for the same codes.
///
/// # Errors
///
/// Returns [`RecordError::EmptyProductCodes`] if `codes` is empty.
pub fn submit_with_id(
    records: &[SubmissionRecord],
    id: SubmissionId,
    codes: ProductCodes,
    form: AffidavitForm,
    now: DateTime<Utc>,
) -> Result<Submitted, RecordError> {
    let record = SubmissionRecord::pending(id, codes, now, Some(form))?;
    let mut records = records.to_vec();
    records.push(record.clone());
    Ok(Submitted { records, record })
}

/// Approve the pending record `id`.
///
/// Returns `None` when no record has that id or it is no longer pending; the
/// caller must then leave the stored list untouched.
#[must_use]
pub fn approve(
    records: &[SubmissionRecord],
    id: &SubmissionId,
    now: DateTime<Utc>,
) -> Option<Applied> {
    decide(
        records,
        id,
        SubmissionStatus::Approved {
            approved_at: now,
            expires_at: Some(now + Duration::days(APPROVAL_VALIDITY_DAYS)),
        },
    )
}

/// Reject the pending record `id`. Same matching rules as [`approve`].
#[must_use]
pub fn reject(records: &[SubmissionRecord], id: &SubmissionId) -> Option<Applied> {
    decide(records, id, SubmissionStatus::Rejected)
}

fn decide(
    records: &[SubmissionRecord],
    id: &SubmissionId,
    status: SubmissionStatus,
) -> Option<Applied> {
    let index = records
        .iter()
        .position(|r| r.id() == id && r.status().is_pending())?;

    let mut records = records.to_vec();
    let target = records.get_mut(index)?;
    target.set_status(status);
    let record = target.clone();

    Some(Applied { records, record })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::types::StatusKind;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn code(s: &str) -> ProductCode {
        ProductCode::parse(s).unwrap()
    }

    fn sid(s: &str) -> SubmissionId {
        SubmissionId::parse(s).unwrap()
    }

    fn form(codes: &str) -> AffidavitForm {
        let fields: HashMap<String, String> = [("productCodes", codes), ("name", "Test")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        AffidavitForm::from_fields(&fields).unwrap()
    }

    fn approved(id: &str, codes: &str, at: &str, expires: Option<&str>) -> SubmissionRecord {
        SubmissionRecord::from_parts(
            sid(id),
            ProductCodes::parse_delimited(codes),
            SubmissionStatus::Approved {
                approved_at: ts(at),
                expires_at: expires.map(ts),
            },
            ts(at),
            None,
        )
        .unwrap()
    }

    fn pending(id: &str, codes: &str) -> SubmissionRecord {
        SubmissionRecord::pending(
            sid(id),
            ProductCodes::parse_delimited(codes),
            ts("2024-01-01T00:00:00Z"),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_approval_valid_until_expiry() {
        let records = vec![approved(
            "s1",
            "A123,B456",
            "2024-01-01T00:00:00Z",
            Some("2025-01-01T00:00:00Z"),
        )];
        let codes = ProductCodes::parse_delimited("A123");

        let mid = check_batch(&records, &codes, ts("2024-06-01T00:00:00Z"));
        assert!(mid.valid);
        assert_eq!(mid.valid_for, vec![code("A123")]);

        let after = check_batch(&records, &codes, ts("2025-06-01T00:00:00Z"));
        assert!(!after.valid);
        assert_eq!(after.missing, vec![code("A123")]);
    }

    #[test]
    fn test_never_expiring_approval_is_valid() {
        let records = vec![approved("s1", "A", "2019-01-01T00:00:00Z", None)];
        assert!(is_valid_for(&records, &code("A"), ts("2099-01-01T00:00:00Z")));
    }

    #[test]
    fn test_rejected_code_always_missing() {
        let submitted = submit_with_id(
            &[],
            sid("s1"),
            ProductCodes::parse_delimited("X"),
            form("X"),
            ts("2024-01-01T00:00:00Z"),
        )
        .unwrap();
        let rejected = reject(&submitted.records, &sid("s1")).unwrap();

        let check = check_batch(
            &rejected.records,
            &ProductCodes::parse_delimited("X"),
            ts("2024-01-02T00:00:00Z"),
        );
        assert!(!check.valid);
        assert_eq!(check.missing, vec![code("X")]);
        assert!(!has_pending(&rejected.records, &ProductCodes::parse_delimited("X")));
    }

    #[test]
    fn test_mixed_batch_partitions_codes() {
        let records = vec![approved(
            "s1",
            "A",
            "2024-01-01T00:00:00Z",
            Some("2025-01-01T00:00:00Z"),
        )];
        let check = check_batch(
            &records,
            &ProductCodes::parse_delimited("B,A,C"),
            ts("2024-02-01T00:00:00Z"),
        );
        assert!(!check.valid);
        assert_eq!(check.valid_for, vec![code("A")]);
        assert_eq!(check.missing, vec![code("B"), code("C")]);
    }

    #[test]
    fn test_empty_query_is_valid() {
        let check = check_batch(&[], &ProductCodes::new(), Utc::now());
        assert!(check.valid);
        assert!(check.valid_for.is_empty());
        assert!(check.missing.is_empty());
    }

    #[test]
    fn test_submit_appends_without_touching_existing() {
        let existing = vec![pending("s0", "A"), approved("s1", "B", "2024-01-01T00:00:00Z", None)];
        let submitted = submit(
            &existing,
            ProductCodes::parse_delimited("A"),
            form("A"),
            ts("2024-03-01T00:00:00Z"),
        )
        .unwrap();

        assert_eq!(submitted.records.len(), 3);
        assert_eq!(&submitted.records[..2], &existing[..]);
        assert_eq!(submitted.records[2], submitted.record);
        assert_eq!(submitted.record.status().kind(), StatusKind::Pending);
        assert!(submitted.record.form_data().is_some());
    }

    #[test]
    fn test_submit_rejects_empty_codes() {
        let err = submit(&[], ProductCodes::new(), form(""), Utc::now()).unwrap_err();
        assert!(matches!(err, RecordError::EmptyProductCodes(_)));
    }

    #[test]
    fn test_approve_sets_expiry_and_keeps_position() {
        let records = vec![pending("s0", "A"), pending("s1", "B"), pending("s2", "C")];
        let now = ts("2024-01-01T00:00:00Z");
        let applied = approve(&records, &sid("s1"), now).unwrap();

        assert_eq!(applied.records[1].id(), &sid("s1"));
        assert_eq!(
            *applied.record.status(),
            SubmissionStatus::Approved {
                approved_at: now,
                expires_at: Some(ts("2024-12-31T00:00:00Z")),
            }
        );
        assert_eq!(applied.records[0], records[0]);
        assert_eq!(applied.records[2], records[2]);
    }

    #[test]
    fn test_approve_twice_is_not_actionable() {
        let records = vec![pending("s1", "A")];
        let first = approve(&records, &sid("s1"), ts("2024-01-01T00:00:00Z")).unwrap();
        assert!(approve(&first.records, &sid("s1"), ts("2024-02-01T00:00:00Z")).is_none());
        assert!(reject(&first.records, &sid("s1")).is_none());
    }

    #[test]
    fn test_unknown_id_is_not_actionable() {
        let records = vec![pending("s1", "A")];
        assert!(approve(&records, &sid("nope"), Utc::now()).is_none());
        assert!(reject(&records, &sid("nope")).is_none());
    }

    #[test]
    fn test_pending_covering_in_order() {
        let records = vec![
            pending("s0", "Z"),
            pending("s1", "A,B"),
            approved("s2", "A", "2024-01-01T00:00:00Z", None),
            pending("s3", "B"),
        ];
        let codes = ProductCodes::parse_delimited("B");
        let ids: Vec<_> = pending_covering(&records, &codes)
            .map(|r| r.id().as_str())
            .collect();
        assert_eq!(ids, ["s1", "s3"]);
        assert!(has_pending(&records, &codes));
        assert!(!has_pending(&records, &ProductCodes::parse_delimited("Q")));
    }

    #[test]
    fn test_find_by_id() {
        let records = vec![pending("s0", "A"), pending("s1", "B")];
        assert_eq!(find(&records, &sid("s1")).map(SubmissionRecord::id), Some(&sid("s1")));
        assert!(find(&records, &sid("s9")).is_none());
    }

    proptest! {
        #[test]
        fn expired_approval_never_valid(
            approved_offset in 0i64..1_000_000,
            validity in 1i64..100_000,
            past in 0i64..1_000_000,
        ) {
            let base = ts("2020-01-01T00:00:00Z");
            let approved_at = base + Duration::seconds(approved_offset);
            let expires_at = approved_at + Duration::seconds(validity);
            let now = expires_at + Duration::seconds(past);

            let record = SubmissionRecord::from_parts(
                sid("p"),
                ProductCodes::parse_delimited("A"),
                SubmissionStatus::Approved { approved_at, expires_at: Some(expires_at) },
                approved_at,
                None,
            ).unwrap();

            prop_assert!(!is_valid_for(&[record], &code("A"), now));
        }

        #[test]
        fn check_batch_partitions_query(codes in proptest::collection::vec("[A-D][0-9]", 0..8)) {
            let records = vec![approved("s", "A0,B1,C2", "2024-01-01T00:00:00Z", None)];
            let query: ProductCodes = codes.iter().filter_map(|c| ProductCode::parse(c).ok()).collect();
            let check = check_batch(&records, &query, ts("2024-06-01T00:00:00Z"));

            prop_assert_eq!(check.valid, check.missing.is_empty());
            prop_assert_eq!(check.valid_for.len() + check.missing.len(), query.len());
            for c in &check.valid_for {
                prop_assert!(!check.missing.contains(c));
            }
        }
    }
}
