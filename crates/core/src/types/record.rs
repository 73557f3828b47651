//! Submission records and their status.
//!
//! A [`SubmissionRecord`] is one affidavit filing. Records are persisted as a
//! JSON array per customer with a flat layout:
//!
//! ```json
//! {"id": "...", "product_codes": ["A123"], "status": "approved",
//!  "submitted_at": "...", "approved_at": "...", "expires_at": "...",
//!  "form_data": {...}}
//! ```
//!
//! In memory, approval data lives inside [`SubmissionStatus::Approved`] so a
//! pending or rejected record cannot carry an approval date.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::form::AffidavitForm;
use super::id::SubmissionId;
use super::product_code::ProductCodes;

/// Errors raised when a persisted record is internally inconsistent.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The record covers no product codes.
    #[error("submission {0} has no product codes")]
    EmptyProductCodes(SubmissionId),

    /// A non-approved record carries approval fields.
    #[error("submission {id} is {status} but carries approval dates")]
    ApprovalFieldsOnUndecided {
        /// Offending record.
        id: SubmissionId,
        /// Its flat status.
        status: StatusKind,
    },

    /// An approved record has no approval date.
    #[error("submission {0} is approved but has no approved_at")]
    MissingApprovedAt(SubmissionId),
}

/// Flat status as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Approved,
    Rejected,
}

impl StatusKind {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Awaiting a reviewer decision.
    Pending,
    /// Approved by a reviewer.
    Approved {
        approved_at: DateTime<Utc>,
        /// `None` means the approval never expires (migrated records only).
        expires_at: Option<DateTime<Utc>>,
    },
    /// Rejected by a reviewer. Terminal.
    Rejected,
}

impl SubmissionStatus {
    /// Flat status name.
    #[must_use]
    pub const fn kind(&self) -> StatusKind {
        match self {
            Self::Pending => StatusKind::Pending,
            Self::Approved { .. } => StatusKind::Approved,
            Self::Rejected => StatusKind::Rejected,
        }
    }

    /// Whether this status is `Pending`.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether this is an approval that is still in force at `now`.
    #[must_use]
    pub fn is_active_approval(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Approved { expires_at, .. } => expires_at.is_none_or(|exp| exp > now),
            Self::Pending | Self::Rejected => false,
        }
    }
}

/// One affidavit filing covering a set of product codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord", into = "StoredRecord")]
pub struct SubmissionRecord {
    id: SubmissionId,
    product_codes: ProductCodes,
    status: SubmissionStatus,
    submitted_at: DateTime<Utc>,
    form_data: Option<AffidavitForm>,
}

impl SubmissionRecord {
    /// Create a new pending record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyProductCodes`] if `product_codes` is empty.
    pub fn pending(
        id: SubmissionId,
        product_codes: ProductCodes,
        submitted_at: DateTime<Utc>,
        form_data: Option<AffidavitForm>,
    ) -> Result<Self, RecordError> {
        Self::from_parts(
            id,
            product_codes,
            SubmissionStatus::Pending,
            submitted_at,
            form_data,
        )
    }

    /// Assemble a record with an arbitrary status.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyProductCodes`] if `product_codes` is empty.
    pub fn from_parts(
        id: SubmissionId,
        product_codes: ProductCodes,
        status: SubmissionStatus,
        submitted_at: DateTime<Utc>,
        form_data: Option<AffidavitForm>,
    ) -> Result<Self, RecordError> {
        if product_codes.is_empty() {
            return Err(RecordError::EmptyProductCodes(id));
        }
        Ok(Self {
            id,
            product_codes,
            status,
            submitted_at,
            form_data,
        })
    }

    #[must_use]
    pub const fn id(&self) -> &SubmissionId {
        &self.id
    }

    #[must_use]
    pub const fn product_codes(&self) -> &ProductCodes {
        &self.product_codes
    }

    #[must_use]
    pub const fn status(&self) -> &SubmissionStatus {
        &self.status
    }

    #[must_use]
    pub const fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// The attested form. `None` for records migrated from the legacy schema.
    #[must_use]
    pub const fn form_data(&self) -> Option<&AffidavitForm> {
        self.form_data.as_ref()
    }

    /// Whether this record covers any of `codes`.
    #[must_use]
    pub fn covers_any(&self, codes: &ProductCodes) -> bool {
        self.product_codes.intersects(codes.as_slice())
    }

    pub(crate) const fn set_status(&mut self, status: SubmissionStatus) {
        self.status = status;
    }
}

/// Flat persisted layout.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    id: SubmissionId,
    product_codes: ProductCodes,
    status: StatusKind,
    submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    form_data: Option<AffidavitForm>,
}

impl TryFrom<StoredRecord> for SubmissionRecord {
    type Error = RecordError;

    fn try_from(raw: StoredRecord) -> Result<Self, Self::Error> {
        let status = match raw.status {
            StatusKind::Approved => SubmissionStatus::Approved {
                approved_at: raw
                    .approved_at
                    .ok_or_else(|| RecordError::MissingApprovedAt(raw.id.clone()))?,
                expires_at: raw.expires_at,
            },
            kind @ (StatusKind::Pending | StatusKind::Rejected) => {
                if raw.approved_at.is_some() || raw.expires_at.is_some() {
                    return Err(RecordError::ApprovalFieldsOnUndecided {
                        id: raw.id,
                        status: kind,
                    });
                }
                if kind == StatusKind::Pending {
                    SubmissionStatus::Pending
                } else {
                    SubmissionStatus::Rejected
                }
            }
        };

        Self::from_parts(
            raw.id,
            raw.product_codes,
            status,
            raw.submitted_at,
            raw.form_data,
        )
    }
}

impl From<SubmissionRecord> for StoredRecord {
    fn from(record: SubmissionRecord) -> Self {
        let (approved_at, expires_at) = match record.status {
            SubmissionStatus::Approved {
                approved_at,
                expires_at,
            } => (Some(approved_at), expires_at),
            SubmissionStatus::Pending | SubmissionStatus::Rejected => (None, None),
        };
        Self {
            id: record.id,
            product_codes: record.product_codes,
            status: record.status.kind(),
            submitted_at: record.submitted_at,
            approved_at,
            expires_at,
            form_data: record.form_data,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_flat_approved_record() {
        let record: SubmissionRecord = serde_json::from_value(json!({
            "id": "sub-1",
            "product_codes": ["A123", "B456"],
            "status": "approved",
            "submitted_at": "2023-12-20T10:00:00Z",
            "approved_at": "2024-01-01T00:00:00Z",
            "expires_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.id().as_str(), "sub-1");
        assert_eq!(record.status().kind(), StatusKind::Approved);
        assert!(record.form_data().is_none());
    }

    #[test]
    fn test_pending_record_omits_approval_fields() {
        let record = SubmissionRecord::pending(
            SubmissionId::parse("sub-2").unwrap(),
            ProductCodes::parse_delimited("X"),
            "2024-03-01T00:00:00Z".parse().unwrap(),
            None,
        )
        .unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("approved_at").is_none());
        assert!(json.get("expires_at").is_none());

        let back: SubmissionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_never_expiring_approval_survives() {
        let record: SubmissionRecord = serde_json::from_value(json!({
            "id": "legacy",
            "product_codes": ["A"],
            "status": "approved",
            "submitted_at": "2020-01-01T00:00:00Z",
            "approved_at": "2020-01-02T00:00:00Z"
        }))
        .unwrap();

        assert!(record.status().is_active_approval(Utc::now()));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("expires_at").is_none());
    }

    #[test]
    fn test_rejects_contradictory_flat_fields() {
        let err = serde_json::from_value::<SubmissionRecord>(json!({
            "id": "bad",
            "product_codes": ["A"],
            "status": "pending",
            "submitted_at": "2024-01-01T00:00:00Z",
            "expires_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("carries approval dates"));

        let err = serde_json::from_value::<SubmissionRecord>(json!({
            "id": "bad",
            "product_codes": ["A"],
            "status": "approved",
            "submitted_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("no approved_at"));
    }

    #[test]
    fn test_rejects_empty_product_codes() {
        let err = serde_json::from_value::<SubmissionRecord>(json!({
            "id": "bad",
            "product_codes": [],
            "status": "rejected",
            "submitted_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("no product codes"));
    }

    #[test]
    fn test_active_approval_boundary() {
        let at: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();
        let status = SubmissionStatus::Approved {
            approved_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            expires_at: Some(at),
        };
        assert!(status.is_active_approval(at - chrono::Duration::seconds(1)));
        assert!(!status.is_active_approval(at));
        assert!(!SubmissionStatus::Pending.is_active_approval(at));
    }

    fn form_json(implant_days: serde_json::Value) -> serde_json::Value {
        json!({
            "name": "Dana Reyes",
            "company": "Reyes Surgical",
            "address1": "12 Harbor Rd",
            "city": "Lake Havasu",
            "state": "AZ",
            "postal": "86403",
            "country": "US",
            "telephone": "555-0100",
            "email": "dana@example.com",
            "productCodes": "A123",
            "contactTissue": "yes",
            "howForm": "sheet",
            "implanted": "yes",
            "implantDays": implant_days,
            "protocol": "Bench testing",
            "printName": "Dana Reyes",
            "signature": "aGVsbG8=",
            "title": "Director",
            "date": "2024-01-05"
        })
    }

    #[test]
    fn test_mixed_history_round_trips() {
        let form: AffidavitForm = serde_json::from_value(form_json(json!(30))).unwrap();
        let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap();
        let records = vec![
            SubmissionRecord::pending(
                SubmissionId::parse("sub-pending").unwrap(),
                ProductCodes::parse_delimited("A123"),
                at("2024-03-01T00:00:00Z"),
                Some(form),
            )
            .unwrap(),
            SubmissionRecord::from_parts(
                SubmissionId::parse("sub-approved").unwrap(),
                ProductCodes::parse_delimited("A123, B456"),
                SubmissionStatus::Approved {
                    approved_at: at("2024-01-02T00:00:00Z"),
                    expires_at: Some(at("2025-01-01T00:00:00Z")),
                },
                at("2024-01-01T00:00:00Z"),
                None,
            )
            .unwrap(),
            SubmissionRecord::from_parts(
                SubmissionId::parse("sub-legacy").unwrap(),
                ProductCodes::parse_delimited("C789"),
                SubmissionStatus::Approved {
                    approved_at: at("2020-01-02T00:00:00Z"),
                    expires_at: None,
                },
                at("2020-01-01T00:00:00Z"),
                None,
            )
            .unwrap(),
            SubmissionRecord::from_parts(
                SubmissionId::parse("sub-rejected").unwrap(),
                ProductCodes::parse_delimited("D000"),
                SubmissionStatus::Rejected,
                at("2024-02-01T00:00:00Z"),
                None,
            )
            .unwrap(),
        ];

        let text = serde_json::to_string(&records).unwrap();
        let back: Vec<SubmissionRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_negative_implant_days_does_not_block_document() {
        let records: Vec<SubmissionRecord> = serde_json::from_value(json!([
            {
                "id": "sub-old",
                "product_codes": ["A123"],
                "status": "pending",
                "submitted_at": "2023-06-01T00:00:00Z",
                "form_data": form_json(json!(-3))
            },
            {
                "id": "sub-new",
                "product_codes": ["B456"],
                "status": "rejected",
                "submitted_at": "2024-06-01T00:00:00Z"
            }
        ]))
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records.first().and_then(SubmissionRecord::form_data).map(|f| f.implant_days),
            Some(None)
        );
    }
}
