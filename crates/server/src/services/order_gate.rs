//! Order gate.
//!
//! Runs on every `orders/create` webhook. Products carrying the affidavit
//! gating metafields contribute their product codes; if the ordering
//! customer has a pending submission for any of them the order is held until
//! a reviewer decides.
//!
//! Holding is best-effort. The decision of what *should* happen is returned
//! and logged even when the platform call fails, so staff can reconcile.

use std::collections::BTreeSet;
use std::sync::Arc;

use affidavit_core::{
    CustomerId, OrderAffidavitReference, OrderId, ProductCodes, ProductId, SubmissionId, engine,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::config::GateConfig;
use crate::platform::Platform;
use crate::store::{StoreError, SubmissionStore};

/// Fulfillment hold note for orders waiting on a pending submission.
pub const PENDING_HOLD_REASON: &str = "Pending affidavit approval";

/// Fulfillment hold note for orders with no submission at all.
pub const MISSING_HOLD_REASON: &str = "Affidavit required";

/// The parts of an `orders/create` webhook payload the gate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    pub id: OrderId,
    #[serde(default)]
    pub customer: Option<OrderCustomer>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderCustomer {
    pub id: CustomerId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    /// `null` for custom line items.
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

/// What the gate did with an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Guest checkout or no line items.
    Skipped,
    /// No line item is gated.
    NotGated,
    /// Held for a pending submission.
    Held { submission_id: SubmissionId },
    /// Every gated code has an approval in force.
    Cleared,
    /// Gated codes lack approval and nothing is pending; let through.
    Ungated,
    /// Gated codes lack approval and nothing is pending; held.
    HeldAwaitingSubmission,
}

impl GateDecision {
    /// Short name for logs and responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::NotGated => "not_gated",
            Self::Held { .. } => "held",
            Self::Cleared => "cleared",
            Self::Ungated => "ungated",
            Self::HeldAwaitingSubmission => "held_awaiting_submission",
        }
    }
}

/// Decides and applies holds for new orders.
#[derive(Clone)]
pub struct OrderGate {
    store: Arc<dyn SubmissionStore>,
    platform: Arc<dyn Platform>,
    config: GateConfig,
}

impl OrderGate {
    #[must_use]
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        platform: Arc<dyn Platform>,
        config: GateConfig,
    ) -> Self {
        Self {
            store,
            platform,
            config,
        }
    }

    /// Gate a newly created order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the customer's submissions cannot be read.
    #[instrument(skip(self, order, now), fields(order_id = %order.id))]
    pub async fn handle(
        &self,
        order: &OrderPayload,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, StoreError> {
        let Some(customer) = order.customer.as_ref().map(|c| c.id) else {
            return Ok(GateDecision::Skipped);
        };
        if order.line_items.is_empty() {
            return Ok(GateDecision::Skipped);
        }

        let codes = self.gated_codes(order).await;
        if codes.is_empty() {
            return Ok(GateDecision::NotGated);
        }

        let records = self.store.load(customer).await?.records;

        if let Some(pending) = engine::pending_covering(&records, &codes).next() {
            let reference = OrderAffidavitReference::for_record(customer, pending, now, None);
            self.hold(order.id, Some(&reference), PENDING_HOLD_REASON)
                .await;
            tracing::info!(
                order_id = %order.id,
                customer_id = %customer,
                submission_id = %pending.id(),
                "Order held for pending affidavit"
            );
            return Ok(GateDecision::Held {
                submission_id: pending.id().clone(),
            });
        }

        let check = engine::check_batch(&records, &codes, now);
        if check.valid {
            tracing::info!(order_id = %order.id, customer_id = %customer, "Affidavit on file; order cleared");
            return Ok(GateDecision::Cleared);
        }

        let missing: Vec<&str> = check.missing.iter().map(|c| c.as_str()).collect();
        if self.config.hold_without_submission {
            self.hold(order.id, None, MISSING_HOLD_REASON).await;
            tracing::warn!(
                order_id = %order.id,
                customer_id = %customer,
                missing = ?missing,
                "Order held: no affidavit on file"
            );
            return Ok(GateDecision::HeldAwaitingSubmission);
        }

        tracing::warn!(
            order_id = %order.id,
            customer_id = %customer,
            missing = ?missing,
            "Gated order has no affidavit on file; not held"
        );
        Ok(GateDecision::Ungated)
    }

    /// Union of gated product codes across the order's distinct products.
    async fn gated_codes(&self, order: &OrderPayload) -> ProductCodes {
        let products: BTreeSet<ProductId> = order
            .line_items
            .iter()
            .filter_map(|item| item.product_id)
            .collect();

        let mut codes = ProductCodes::new();
        for product in products {
            match self.platform.product_gating(product).await {
                Ok(Some(gated)) => codes.extend(gated),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        order_id = %order.id,
                        product_id = %product,
                        error = %e,
                        "Product gating lookup failed; treating as not gated"
                    );
                }
            }
        }
        codes
    }

    async fn hold(&self, order: OrderId, reference: Option<&OrderAffidavitReference>, reason: &str) {
        if let Some(reference) = reference
            && let Err(e) = self.platform.attach_order_reference(order, reference).await
        {
            tracing::error!(order_id = %order, error = %e, "Failed to attach affidavit reference");
        }
        if let Err(e) = self.platform.hold_order(order, reason).await {
            tracing::error!(order_id = %order, error = %e, "Failed to hold order");
        }
    }
}
