//! Commerce platform seam.
//!
//! The workflow and the order gate only need a few platform operations. They
//! go through [`Platform`] so tests can substitute an in-memory fake for the
//! Shopify [`AdminClient`].

use std::time::Duration;

use affidavit_core::{CustomerId, OrderAffidavitReference, OrderId, ProductCodes, ProductId};
use futures::future::BoxFuture;
use moka::future::Cache;

use crate::shopify::{AdminClient, ShopifyError, WriteCondition};

/// Order metafield holding the [`OrderAffidavitReference`].
pub const ORDER_REFERENCE_KEY: &str = "affidavit_submission";

/// Name and address used for customer notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
}

/// Platform operations used by the affidavit workflow and the order gate.
pub trait Platform: Send + Sync {
    /// Product codes gating `product`, or `None` when it is not gated.
    fn product_gating<'a>(
        &'a self,
        product: ProductId,
    ) -> BoxFuture<'a, Result<Option<ProductCodes>, ShopifyError>>;

    /// Contact details for a customer, if they have an email address.
    fn customer_contact<'a>(
        &'a self,
        customer: CustomerId,
    ) -> BoxFuture<'a, Result<Option<CustomerContact>, ShopifyError>>;

    /// Store the affidavit cross-reference on an order.
    fn attach_order_reference<'a>(
        &'a self,
        order: OrderId,
        reference: &'a OrderAffidavitReference,
    ) -> BoxFuture<'a, Result<(), ShopifyError>>;

    /// Hold fulfillment of an order.
    fn hold_order<'a>(
        &'a self,
        order: OrderId,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>>;

    /// Release any fulfillment hold on an order.
    fn release_order_hold<'a>(&'a self, order: OrderId) -> BoxFuture<'a, Result<(), ShopifyError>>;

    /// Cancel an order with refund and restock.
    fn cancel_order<'a>(
        &'a self,
        order: OrderId,
        staff_note: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>>;
}

impl Platform for AdminClient {
    fn product_gating<'a>(
        &'a self,
        product: ProductId,
    ) -> BoxFuture<'a, Result<Option<ProductCodes>, ShopifyError>> {
        Box::pin(async move { Self::product_gating(self, product).await })
    }

    fn customer_contact<'a>(
        &'a self,
        customer: CustomerId,
    ) -> BoxFuture<'a, Result<Option<CustomerContact>, ShopifyError>> {
        Box::pin(async move { Self::customer_contact(self, customer).await })
    }

    fn attach_order_reference<'a>(
        &'a self,
        order: OrderId,
        reference: &'a OrderAffidavitReference,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move {
            let value = serde_json::to_string(reference)?;
            self.set_app_metafield(
                order.to_gid(),
                ORDER_REFERENCE_KEY,
                value,
                WriteCondition::Unchecked,
            )
            .await?;
            Ok(())
        })
    }

    fn hold_order<'a>(
        &'a self,
        order: OrderId,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move {
            let held = Self::hold_order(self, order, reason).await?;
            tracing::debug!(order_id = %order, held, "Fulfillment orders held");
            Ok(())
        })
    }

    fn release_order_hold<'a>(&'a self, order: OrderId) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move {
            let released = Self::release_order_hold(self, order).await?;
            tracing::debug!(order_id = %order, released, "Fulfillment holds released");
            Ok(())
        })
    }

    fn cancel_order<'a>(
        &'a self,
        order: OrderId,
        staff_note: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move { Self::cancel_order(self, order, staff_note).await })
    }
}

/// Caches product gating lookups in front of another [`Platform`].
///
/// Every order webhook asks about the same handful of products, so answers
/// are kept for five minutes. Errors are not cached.
pub struct CachedCatalog<P> {
    inner: P,
    gating: Cache<ProductId, Option<ProductCodes>>,
}

impl<P: Platform> CachedCatalog<P> {
    /// Wrap `inner` with a gating cache.
    #[must_use]
    pub fn new(inner: P) -> Self {
        let gating = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { inner, gating }
    }

    /// The wrapped platform.
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// Drop all cached gating answers.
    pub fn invalidate_all(&self) {
        self.gating.invalidate_all();
    }
}

impl<P: Platform> Platform for CachedCatalog<P> {
    fn product_gating<'a>(
        &'a self,
        product: ProductId,
    ) -> BoxFuture<'a, Result<Option<ProductCodes>, ShopifyError>> {
        Box::pin(async move {
            if let Some(cached) = self.gating.get(&product).await {
                tracing::debug!(product_id = %product, "Gating cache hit");
                return Ok(cached);
            }
            let codes = self.inner.product_gating(product).await?;
            self.gating.insert(product, codes.clone()).await;
            Ok(codes)
        })
    }

    fn customer_contact<'a>(
        &'a self,
        customer: CustomerId,
    ) -> BoxFuture<'a, Result<Option<CustomerContact>, ShopifyError>> {
        self.inner.customer_contact(customer)
    }

    fn attach_order_reference<'a>(
        &'a self,
        order: OrderId,
        reference: &'a OrderAffidavitReference,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        self.inner.attach_order_reference(order, reference)
    }

    fn hold_order<'a>(
        &'a self,
        order: OrderId,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        self.inner.hold_order(order, reason)
    }

    fn release_order_hold<'a>(&'a self, order: OrderId) -> BoxFuture<'a, Result<(), ShopifyError>> {
        self.inner.release_order_hold(order)
    }

    fn cancel_order<'a>(
        &'a self,
        order: OrderId,
        staff_note: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        self.inner.cancel_order(order, staff_note)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingPlatform {
        gating_calls: AtomicUsize,
    }

    impl Platform for CountingPlatform {
        fn product_gating<'a>(
            &'a self,
            product: ProductId,
        ) -> BoxFuture<'a, Result<Option<ProductCodes>, ShopifyError>> {
            Box::pin(async move {
                self.gating_calls.fetch_add(1, Ordering::SeqCst);
                if product.as_u64() == 0 {
                    return Err(ShopifyError::NotFound("product 0".to_string()));
                }
                Ok(Some(ProductCodes::parse_delimited("A123")))
            })
        }

        fn customer_contact<'a>(
            &'a self,
            _customer: CustomerId,
        ) -> BoxFuture<'a, Result<Option<CustomerContact>, ShopifyError>> {
            Box::pin(async { Ok(None) })
        }

        fn attach_order_reference<'a>(
            &'a self,
            _order: OrderId,
            _reference: &'a OrderAffidavitReference,
        ) -> BoxFuture<'a, Result<(), ShopifyError>> {
            Box::pin(async { Ok(()) })
        }

        fn hold_order<'a>(
            &'a self,
            _order: OrderId,
            _reason: &'a str,
        ) -> BoxFuture<'a, Result<(), ShopifyError>> {
            Box::pin(async { Ok(()) })
        }

        fn release_order_hold<'a>(
            &'a self,
            _order: OrderId,
        ) -> BoxFuture<'a, Result<(), ShopifyError>> {
            Box::pin(async { Ok(()) })
        }

        fn cancel_order<'a>(
            &'a self,
            _order: OrderId,
            _staff_note: &'a str,
        ) -> BoxFuture<'a, Result<(), ShopifyError>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn test_gating_answers_are_cached() {
        let catalog = CachedCatalog::new(CountingPlatform::default());
        let product = ProductId::new(7);

        let first = catalog.product_gating(product).await.unwrap();
        let second = catalog.product_gating(product).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(catalog.inner().gating_calls.load(Ordering::SeqCst), 1);

        catalog.invalidate_all();
        catalog.product_gating(product).await.unwrap();
        assert_eq!(catalog.inner().gating_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let catalog = CachedCatalog::new(CountingPlatform::default());
        let product = ProductId::new(0);

        assert!(catalog.product_gating(product).await.is_err());
        assert!(catalog.product_gating(product).await.is_err());
        assert_eq!(catalog.inner().gating_calls.load(Ordering::SeqCst), 2);
    }
}
