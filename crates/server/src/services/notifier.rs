//! Outbound notices about submissions.

use affidavit_core::{AffidavitForm, CustomerId, OrderId, ProductCodes, SubmissionId};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use super::email::EmailError;
use crate::platform::CustomerContact;

/// A file uploaded with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Sent to the reviewer when a customer files an affidavit.
#[derive(Debug, Clone)]
pub struct SubmissionNotice {
    pub customer_id: CustomerId,
    pub submission_id: SubmissionId,
    pub product_codes: ProductCodes,
    pub submitted_at: DateTime<Utc>,
    pub form: AffidavitForm,
    /// Signed link to the review page.
    pub review_url: String,
    /// Rendered affidavit PDF, when rendering succeeded.
    pub document: Option<Vec<u8>>,
    pub attachments: Vec<Attachment>,
}

/// Sent to the customer when their submission is decided.
#[derive(Debug, Clone)]
pub struct DecisionNotice {
    pub to: CustomerContact,
    pub submission_id: SubmissionId,
    pub product_codes: ProductCodes,
    pub decided_at: DateTime<Utc>,
    /// End of the approval period, for approvals.
    pub expires_at: Option<DateTime<Utc>>,
    /// Order that was released or cancelled as a result.
    pub order_id: Option<OrderId>,
    /// Reviewer's reason, for rejections.
    pub reason: Option<String>,
}

/// Delivers submission notices.
pub trait Notifier: Send + Sync {
    fn submission_received<'a>(
        &'a self,
        notice: &'a SubmissionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>>;

    fn submission_approved<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>>;

    fn submission_rejected<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>>;
}

/// Logs notices instead of sending them. Used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn submission_received<'a>(
        &'a self,
        notice: &'a SubmissionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            tracing::info!(
                customer_id = %notice.customer_id,
                submission_id = %notice.submission_id,
                product_codes = %notice.product_codes.join(","),
                review_url = %notice.review_url,
                attachments = notice.attachments.len(),
                has_document = notice.document.is_some(),
                "Email disabled; reviewer notice not sent"
            );
            Ok(())
        })
    }

    fn submission_approved<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            tracing::info!(
                to = %notice.to.email,
                submission_id = %notice.submission_id,
                expires_at = ?notice.expires_at,
                "Email disabled; approval notice not sent"
            );
            Ok(())
        })
    }

    fn submission_rejected<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            tracing::info!(
                to = %notice.to.email,
                submission_id = %notice.submission_id,
                order_id = ?notice.order_id,
                "Email disabled; rejection notice not sent"
            );
            Ok(())
        })
    }
}
