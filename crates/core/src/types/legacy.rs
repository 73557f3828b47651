//! Per-product-code records from the first storage schema.
//!
//! The original layout kept one row per product code under the customer key
//! `approved_affidavits`. It is read only to migrate into
//! [`SubmissionRecord`]s and is never written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::SubmissionId;
use super::product_code::{ProductCode, ProductCodes};
use super::record::{StatusKind, SubmissionRecord, SubmissionStatus};

/// One legacy row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAffidavitStatus {
    pub product_code: ProductCode,
    pub status: StatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub submission_id: SubmissionId,
    pub submitted_at: DateTime<Utc>,
}

type GroupKey = (
    SubmissionId,
    StatusKind,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

/// Convert legacy rows into submission records.
///
/// Rows are grouped by submission id, status and dates, keeping first-seen
/// order. The first group of a submission keeps its id; later groups of the
/// same submission (codes decided differently) get `-2`, `-3`, ... suffixes.
/// Approved rows without `approved_at` fall back to `submitted_at`, and
/// pending or rejected rows drop any stray approval dates.
///
/// ```
/// use affidavit_core::{LegacyAffidavitStatus, migrate_legacy};
///
/// let rows: Vec<LegacyAffidavitStatus> = serde_json::from_str(r#"[
///   {"product_code":"A","status":"approved","submission_id":"s1",
///    "submitted_at":"2023-01-01T00:00:00Z","approved_at":"2023-01-02T00:00:00Z"},
///   {"product_code":"B","status":"approved","submission_id":"s1",
///    "submitted_at":"2023-01-01T00:00:00Z","approved_at":"2023-01-02T00:00:00Z"},
///   {"product_code":"C","status":"rejected","submission_id":"s1",
///    "submitted_at":"2023-01-01T00:00:00Z"}
/// ]"#).unwrap();
///
/// let records = migrate_legacy(&rows);
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].id().as_str(), "s1");
/// assert_eq!(records[0].product_codes().join(","), "A,B");
/// assert_eq!(records[1].id().as_str(), "s1-2");
/// ```
#[must_use]
pub fn migrate_legacy(rows: &[LegacyAffidavitStatus]) -> Vec<SubmissionRecord> {
    let mut groups: Vec<(GroupKey, DateTime<Utc>, ProductCodes)> = Vec::new();

    for row in rows {
        let (approved_at, expires_at) = match row.status {
            StatusKind::Approved => (row.approved_at.or(Some(row.submitted_at)), row.expires_at),
            StatusKind::Pending | StatusKind::Rejected => (None, None),
        };
        let key = (row.submission_id.clone(), row.status, approved_at, expires_at);

        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, codes)) => {
                codes.insert(row.product_code.clone());
            }
            None => {
                let mut codes = ProductCodes::new();
                codes.insert(row.product_code.clone());
                groups.push((key, row.submitted_at, codes));
            }
        }
    }

    let mut seen: Vec<(SubmissionId, usize)> = Vec::new();
    let mut records = Vec::with_capacity(groups.len());

    for ((submission_id, kind, approved_at, expires_at), submitted_at, codes) in groups {
        let id = match seen.iter_mut().find(|(id, _)| *id == submission_id) {
            Some((_, count)) => {
                *count += 1;
                submission_id.with_suffix(*count)
            }
            None => {
                seen.push((submission_id.clone(), 1));
                submission_id
            }
        };

        let status = match (kind, approved_at) {
            (StatusKind::Approved, Some(approved_at)) => SubmissionStatus::Approved {
                approved_at,
                expires_at,
            },
            (StatusKind::Rejected, _) => SubmissionStatus::Rejected,
            _ => SubmissionStatus::Pending,
        };

        // Every group holds at least one code, so this cannot fail.
        if let Ok(record) = SubmissionRecord::from_parts(id, codes, status, submitted_at, None) {
            records.push(record);
        }
    }

    records
}
