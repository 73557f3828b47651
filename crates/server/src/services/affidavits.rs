//! Affidavit workflow.
//!
//! Composes the state engine with storage and the side effects around it.
//! The stored decision is authoritative: once a submission, approval, or
//! rejection is written, failures of the PDF, order, or email steps are
//! logged and do not undo it.

use std::sync::Arc;

use affidavit_core::{
    AffidavitForm, BatchCheck, CustomerId, FormError, OrderAffidavitReference, OrderId,
    ProductCodes, RecordError, StatusKind, SubmissionId, SubmissionRecord, SubmissionStatus,
    engine,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use super::documents::{DocumentError, render_affidavit_pdf};
use super::notifier::{Attachment, DecisionNotice, Notifier, SubmissionNotice};
use super::review_link::ReviewLinkSigner;
use crate::platform::{CustomerContact, Platform};
use crate::store::{StoreError, SubmissionStore, update_submissions};

/// Errors from the affidavit workflow.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The submitted form is invalid.
    #[error(transparent)]
    Form(#[from] FormError),

    /// A record could not be built.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The document could not be rendered.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// No such submission for this customer.
    #[error("Submission not found: {0}")]
    NotFound(String),
}

/// Result of an approve or reject request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The decision was recorded.
    Applied(SubmissionRecord),
    /// Nothing changed: the submission is unknown or already decided.
    NotActionable {
        /// Current status, when the submission exists.
        current: Option<StatusKind>,
    },
}

impl ReviewOutcome {
    /// Human-readable explanation for a not-actionable outcome.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Applied(record) => format!("Submission is now {}", record.status().kind()),
            Self::NotActionable { current: None } => "Submission not found".to_string(),
            Self::NotActionable {
                current: Some(status),
            } => format!("Submission is already {status}"),
        }
    }
}

/// Validity of a set of product codes for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub has_valid_affidavit: bool,
    #[serde(flatten)]
    pub batch: BatchCheck,
    pub has_pending: bool,
}

/// Affidavit submission and review operations.
#[derive(Clone)]
pub struct AffidavitService {
    store: Arc<dyn SubmissionStore>,
    platform: Arc<dyn Platform>,
    notifier: Arc<dyn Notifier>,
    signer: ReviewLinkSigner,
}

impl AffidavitService {
    #[must_use]
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        platform: Arc<dyn Platform>,
        notifier: Arc<dyn Notifier>,
        signer: ReviewLinkSigner,
    ) -> Self {
        Self {
            store,
            platform,
            notifier,
            signer,
        }
    }

    /// Review link signer.
    #[must_use]
    pub const fn signer(&self) -> &ReviewLinkSigner {
        &self.signer
    }

    /// File a new affidavit.
    ///
    /// The record is stored first; the reviewer notice (with the rendered
    /// PDF and `attachments`) follows on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns `Form` for an invalid form (nothing is stored) or `Store`.
    #[instrument(skip(self, form, attachments), fields(customer_id = %customer))]
    pub async fn submit(
        &self,
        customer: CustomerId,
        form: AffidavitForm,
        attachments: Vec<Attachment>,
    ) -> Result<SubmissionRecord, ServiceError> {
        let codes = form.validate()?;
        let now = Utc::now();

        let record = update_submissions(self.store.as_ref(), customer, |records| {
            let overlapping: Vec<&str> = engine::pending_covering(records, &codes)
                .map(|r| r.id().as_str())
                .collect();
            if !overlapping.is_empty() {
                tracing::info!(
                    customer_id = %customer,
                    pending = ?overlapping,
                    "Customer already has pending submissions for these codes"
                );
            }
            let submitted = engine::submit(records, codes.clone(), form.clone(), now)?;
            Ok::<_, ServiceError>(Some((submitted.records, submitted.record)))
        })
        .await?
        .ok_or_else(|| ServiceError::NotFound("submission was not stored".to_string()))?;

        tracing::info!(
            customer_id = %customer,
            submission_id = %record.id(),
            product_codes = %record.product_codes().join(","),
            "Affidavit submitted"
        );

        let document = match render_affidavit_pdf(record.id(), &form, now) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!(submission_id = %record.id(), error = %e, "Failed to render affidavit PDF");
                None
            }
        };

        let notice = SubmissionNotice {
            customer_id: customer,
            submission_id: record.id().clone(),
            product_codes: record.product_codes().clone(),
            submitted_at: now,
            form,
            review_url: self.signer.review_url(customer, record.id()),
            document,
            attachments,
        };
        if let Err(e) = self.notifier.submission_received(&notice).await {
            tracing::error!(submission_id = %record.id(), error = %e, "Failed to notify reviewer");
        }

        Ok(record)
    }

    /// Check which of `codes` the customer holds an approval for.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the submissions cannot be read.
    #[instrument(skip(self, codes), fields(customer_id = %customer, product_codes = %codes.join(",")))]
    pub async fn check(
        &self,
        customer: CustomerId,
        codes: &ProductCodes,
        now: DateTime<Utc>,
    ) -> Result<CheckResult, ServiceError> {
        let stored = self.store.load(customer).await?;
        let batch = engine::check_batch(&stored.records, codes, now);
        Ok(CheckResult {
            has_valid_affidavit: batch.valid,
            has_pending: engine::has_pending(&stored.records, codes),
            batch,
        })
    }

    /// All of a customer's submissions, in submission order.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the submissions cannot be read.
    pub async fn submissions(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<SubmissionRecord>, ServiceError> {
        Ok(self.store.load(customer).await?.records)
    }

    /// Approve a pending submission.
    ///
    /// When `order` is given, the order's affidavit reference is updated and
    /// its hold released. The customer is emailed.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the decision cannot be stored.
    #[instrument(skip(self, id), fields(customer_id = %customer, submission_id = %id))]
    pub async fn approve(
        &self,
        customer: CustomerId,
        id: &SubmissionId,
        order: Option<OrderId>,
    ) -> Result<ReviewOutcome, ServiceError> {
        let now = Utc::now();
        let record = match self
            .decide(customer, id, |records| engine::approve(records, id, now))
            .await?
        {
            ReviewOutcome::Applied(record) => record,
            other => return Ok(other),
        };

        tracing::info!(customer_id = %customer, submission_id = %id, "Affidavit approved");

        if let Some(order) = order {
            self.update_order(customer, order, &record, now, None).await;
            if let Err(e) = self.platform.release_order_hold(order).await {
                tracing::error!(order_id = %order, error = %e, "Failed to release order hold");
            }
        }

        let expires_at = match record.status() {
            SubmissionStatus::Approved { expires_at, .. } => *expires_at,
            SubmissionStatus::Pending | SubmissionStatus::Rejected => None,
        };
        if let Some(to) = self.recipient(customer, &record).await {
            let notice = DecisionNotice {
                to,
                submission_id: id.clone(),
                product_codes: record.product_codes().clone(),
                decided_at: now,
                expires_at,
                order_id: order,
                reason: None,
            };
            if let Err(e) = self.notifier.submission_approved(&notice).await {
                tracing::error!(submission_id = %id, error = %e, "Failed to send approval email");
            }
        }

        Ok(ReviewOutcome::Applied(record))
    }

    /// Reject a pending submission.
    ///
    /// When `order` is given, the order's affidavit reference is updated and
    /// the order cancelled with refund and restock. The customer is emailed.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the decision cannot be stored.
    #[instrument(skip(self, id, reason), fields(customer_id = %customer, submission_id = %id))]
    pub async fn reject(
        &self,
        customer: CustomerId,
        id: &SubmissionId,
        order: Option<OrderId>,
        reason: Option<String>,
    ) -> Result<ReviewOutcome, ServiceError> {
        let now = Utc::now();
        let reason = reason.filter(|r| !r.trim().is_empty());
        let record = match self
            .decide(customer, id, |records| engine::reject(records, id))
            .await?
        {
            ReviewOutcome::Applied(record) => record,
            other => return Ok(other),
        };

        tracing::info!(customer_id = %customer, submission_id = %id, "Affidavit rejected");

        if let Some(order) = order {
            self.update_order(customer, order, &record, now, reason.clone())
                .await;
            let note = reason.as_deref().map_or_else(
                || format!("Affidavit {id} rejected"),
                |r| format!("Affidavit {id} rejected: {r}"),
            );
            if let Err(e) = self.platform.cancel_order(order, &note).await {
                tracing::error!(order_id = %order, error = %e, "Failed to cancel order");
            }
        }

        if let Some(to) = self.recipient(customer, &record).await {
            let notice = DecisionNotice {
                to,
                submission_id: id.clone(),
                product_codes: record.product_codes().clone(),
                decided_at: now,
                expires_at: None,
                order_id: order,
                reason,
            };
            if let Err(e) = self.notifier.submission_rejected(&notice).await {
                tracing::error!(submission_id = %id, error = %e, "Failed to send rejection email");
            }
        }

        Ok(ReviewOutcome::Applied(record))
    }

    /// Render the affidavit PDF for a submission owned by `customer`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the customer has no such submission or it was
    /// migrated without a form, `Document` if rendering fails.
    #[instrument(skip(self, id), fields(customer_id = %customer, submission_id = %id))]
    pub async fn document(
        &self,
        customer: CustomerId,
        id: &SubmissionId,
    ) -> Result<Vec<u8>, ServiceError> {
        let stored = self.store.load(customer).await?;
        let record = engine::find(&stored.records, id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        let form = record
            .form_data()
            .ok_or_else(|| ServiceError::NotFound(format!("{id} has no form on file")))?;
        Ok(render_affidavit_pdf(id, form, record.submitted_at())?)
    }

    /// Apply a review decision through the optimistic write loop.
    async fn decide<F>(
        &self,
        customer: CustomerId,
        id: &SubmissionId,
        mut transition: F,
    ) -> Result<ReviewOutcome, ServiceError>
    where
        F: FnMut(&[SubmissionRecord]) -> Option<engine::Applied>,
    {
        let mut current = None;
        let applied = update_submissions(self.store.as_ref(), customer, |records| {
            current = engine::find(records, id).map(|r| r.status().kind());
            Ok::<_, ServiceError>(transition(records).map(|a| (a.records, a.record)))
        })
        .await?;

        Ok(applied.map_or_else(
            || {
                tracing::info!(
                    customer_id = %customer,
                    submission_id = %id,
                    current = ?current,
                    "Review request not actionable"
                );
                ReviewOutcome::NotActionable { current }
            },
            ReviewOutcome::Applied,
        ))
    }

    async fn update_order(
        &self,
        customer: CustomerId,
        order: OrderId,
        record: &SubmissionRecord,
        now: DateTime<Utc>,
        reason: Option<String>,
    ) {
        let reference = OrderAffidavitReference::for_record(customer, record, now, reason);
        if let Err(e) = self.platform.attach_order_reference(order, &reference).await {
            tracing::error!(order_id = %order, error = %e, "Failed to update order affidavit reference");
        }
    }

    /// Who to tell about a decision: the customer's Shopify contact, falling
    /// back to the email on the form.
    async fn recipient(
        &self,
        customer: CustomerId,
        record: &SubmissionRecord,
    ) -> Option<CustomerContact> {
        match self.platform.customer_contact(customer).await {
            Ok(Some(contact)) => return Some(contact),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(customer_id = %customer, error = %e, "Customer lookup failed");
            }
        }

        let contact = record.form_data().map(|form| CustomerContact {
            name: form.name.clone(),
            email: form.email.clone(),
        });
        if contact.is_none() {
            tracing::warn!(customer_id = %customer, "No email address for decision notice");
        }
        contact
    }
}
