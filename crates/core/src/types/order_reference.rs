//! Cross-reference stored on an order that was gated by an affidavit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{CustomerId, SubmissionId};
use super::product_code::ProductCodes;
use super::record::{StatusKind, SubmissionRecord, SubmissionStatus};

/// JSON value of the order metafield `affidavit_submission`.
///
/// Written when an order is held for a pending submission and rewritten when
/// that submission is decided, so staff can see why an order is on hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAffidavitReference {
    pub submission_id: SubmissionId,
    pub customer_id: CustomerId,
    pub product_codes: ProductCodes,
    pub status: StatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OrderAffidavitReference {
    /// Reference describing `record` as it currently stands.
    ///
    /// `decided_at` is recorded as the rejection time for rejected records;
    /// approved records carry their own approval date.
    #[must_use]
    pub fn for_record(
        customer_id: CustomerId,
        record: &SubmissionRecord,
        decided_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Self {
        let (approved_at, rejected_at) = match record.status() {
            SubmissionStatus::Pending => (None, None),
            SubmissionStatus::Approved { approved_at, .. } => (Some(*approved_at), None),
            SubmissionStatus::Rejected => (None, Some(decided_at)),
        };

        Self {
            submission_id: record.id().clone(),
            customer_id,
            product_codes: record.product_codes().clone(),
            status: record.status().kind(),
            submitted_at: Some(record.submitted_at()),
            approved_at,
            rejected_at,
            reason: reason.filter(|r| !r.trim().is_empty()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record() -> SubmissionRecord {
        SubmissionRecord::pending(
            SubmissionId::parse("sub-9").unwrap(),
            ProductCodes::parse_delimited("A123"),
            "2024-02-01T00:00:00Z".parse().unwrap(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_pending_reference_layout() {
        let reference =
            OrderAffidavitReference::for_record(CustomerId::new(77), &record(), Utc::now(), None);
        let json = serde_json::to_value(&reference).unwrap();

        assert_eq!(json["submission_id"], "sub-9");
        assert_eq!(json["customer_id"], "77");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["product_codes"][0], "A123");
        assert!(json.get("rejected_at").is_none());
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_rejected_reference_keeps_reason() {
        let mut rec = record();
        rec.set_status(SubmissionStatus::Rejected);
        let now: DateTime<Utc> = "2024-02-05T00:00:00Z".parse().unwrap();

        let reference = OrderAffidavitReference::for_record(
            CustomerId::new(77),
            &rec,
            now,
            Some("Protocol incomplete".to_owned()),
        );
        assert_eq!(reference.status, StatusKind::Rejected);
        assert_eq!(reference.rejected_at, Some(now));
        assert_eq!(reference.reason.as_deref(), Some("Protocol incomplete"));
    }

    #[test]
    fn test_blank_reason_dropped() {
        let reference = OrderAffidavitReference::for_record(
            CustomerId::new(1),
            &record(),
            Utc::now(),
            Some("  ".to_owned()),
        );
        assert!(reference.reason.is_none());
    }
}
