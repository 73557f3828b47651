//! Integration tests for the affidavit service.
//!
//! The router and services run against [`MemoryStore`] and the in-memory
//! fakes below; no Shopify store or SMTP relay is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p affidavit-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `workflow` - Submission, check, approve and reject through the service
//! - `order_gate` - Order gate decisions and platform calls
//! - `http` - The router end to end, including signatures

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use affidavit_core::{
    AffidavitForm, CustomerId, OrderAffidavitReference, OrderId, ProductCodes, ProductId,
};
use affidavit_server::config::GateConfig;
use affidavit_server::platform::{CustomerContact, Platform};
use affidavit_server::routes;
use affidavit_server::services::{
    DecisionNotice, EmailError, Notifier, ReviewLinkSigner, SubmissionNotice,
};
use affidavit_server::shopify::ShopifyError;
use affidavit_server::state::{AppState, Components};
use affidavit_server::store::MemoryStore;
use axum::Router;
use base64::{Engine, engine::general_purpose::STANDARD};
use futures::future::BoxFuture;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use url::Url;

/// Secret the fake Shopify signs webhooks with.
pub const WEBHOOK_SECRET: &str = "shpss_test_0123456789abcdef0123456789abcdef";

/// Secret for reviewer links.
pub const REVIEW_SECRET: &str = "review-link-secret-0123456789abcdef0123";

/// Public base URL of the app under test.
pub const BASE_URL: &str = "https://affidavits.example.com";

/// Lock a mutex, ignoring poisoning from a failed test thread.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Fake platform
// ============================================================================

/// A platform call observed by [`FakePlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    AttachReference {
        order: OrderId,
        reference: OrderAffidavitReference,
    },
    Hold {
        order: OrderId,
        reason: String,
    },
    Release(OrderId),
    Cancel {
        order: OrderId,
        note: String,
    },
}

/// In-memory catalog and order operations that record every call.
#[derive(Debug, Default)]
pub struct FakePlatform {
    gating: Mutex<HashMap<ProductId, ProductCodes>>,
    failing_products: Mutex<HashSet<ProductId>>,
    contacts: Mutex<HashMap<CustomerId, CustomerContact>>,
    calls: Mutex<Vec<PlatformCall>>,
}

impl FakePlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate `product` on the comma-separated `codes`.
    pub fn gate_product(&self, product: ProductId, codes: &str) {
        lock(&self.gating).insert(product, ProductCodes::parse_delimited(codes));
    }

    /// Make gating lookups for `product` fail.
    pub fn fail_product(&self, product: ProductId) {
        lock(&self.failing_products).insert(product);
    }

    /// Register the contact details Shopify holds for a customer.
    pub fn set_contact(&self, customer: CustomerId, name: &str, email: &str) {
        lock(&self.contacts).insert(
            customer,
            CustomerContact {
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: PlatformCall) {
        lock(&self.calls).push(call);
    }
}

impl Platform for FakePlatform {
    fn product_gating<'a>(
        &'a self,
        product: ProductId,
    ) -> BoxFuture<'a, Result<Option<ProductCodes>, ShopifyError>> {
        Box::pin(async move {
            if lock(&self.failing_products).contains(&product) {
                return Err(ShopifyError::RateLimited(2));
            }
            Ok(lock(&self.gating).get(&product).cloned())
        })
    }

    fn customer_contact<'a>(
        &'a self,
        customer: CustomerId,
    ) -> BoxFuture<'a, Result<Option<CustomerContact>, ShopifyError>> {
        Box::pin(async move { Ok(lock(&self.contacts).get(&customer).cloned()) })
    }

    fn attach_order_reference<'a>(
        &'a self,
        order: OrderId,
        reference: &'a OrderAffidavitReference,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move {
            self.record(PlatformCall::AttachReference {
                order,
                reference: reference.clone(),
            });
            Ok(())
        })
    }

    fn hold_order<'a>(
        &'a self,
        order: OrderId,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move {
            self.record(PlatformCall::Hold {
                order,
                reason: reason.to_string(),
            });
            Ok(())
        })
    }

    fn release_order_hold<'a>(&'a self, order: OrderId) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move {
            self.record(PlatformCall::Release(order));
            Ok(())
        })
    }

    fn cancel_order<'a>(
        &'a self,
        order: OrderId,
        staff_note: &'a str,
    ) -> BoxFuture<'a, Result<(), ShopifyError>> {
        Box::pin(async move {
            self.record(PlatformCall::Cancel {
                order,
                note: staff_note.to_string(),
            });
            Ok(())
        })
    }
}

// ============================================================================
// Recording notifier
// ============================================================================

/// Keeps every notice instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<SubmissionNotice>>,
    approved: Mutex<Vec<DecisionNotice>>,
    rejected: Mutex<Vec<DecisionNotice>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn received(&self) -> Vec<SubmissionNotice> {
        lock(&self.received).clone()
    }

    #[must_use]
    pub fn approved(&self) -> Vec<DecisionNotice> {
        lock(&self.approved).clone()
    }

    #[must_use]
    pub fn rejected(&self) -> Vec<DecisionNotice> {
        lock(&self.rejected).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn submission_received<'a>(
        &'a self,
        notice: &'a SubmissionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            lock(&self.received).push(notice.clone());
            Ok(())
        })
    }

    fn submission_approved<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            lock(&self.approved).push(notice.clone());
            Ok(())
        })
    }

    fn submission_rejected<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            lock(&self.rejected).push(notice.clone());
            Ok(())
        })
    }
}

// ============================================================================
// Test application
// ============================================================================

/// Application state wired to in-memory collaborators, with handles to
/// inspect them.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub platform: Arc<FakePlatform>,
    pub notifier: Arc<RecordingNotifier>,
    pub signer: ReviewLinkSigner,
}

impl TestApp {
    /// Default gate configuration: gated orders without a submission pass.
    #[must_use]
    pub fn new() -> Self {
        Self::with_gate(GateConfig::default())
    }

    #[must_use]
    pub fn with_gate(gate: GateConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(FakePlatform::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let signer = signer();

        let state = AppState::new(Components {
            store: store.clone(),
            platform: platform.clone(),
            notifier: notifier.clone(),
            signer: signer.clone(),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            gate,
        });

        Self {
            state,
            store,
            platform,
            notifier,
            signer,
        }
    }

    /// The full router over this app's state.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Review link signer matching [`TestApp`].
///
/// # Panics
///
/// Never: [`BASE_URL`] is a valid URL.
#[must_use]
pub fn signer() -> ReviewLinkSigner {
    ReviewLinkSigner::new(
        SecretString::from(REVIEW_SECRET),
        Url::parse(BASE_URL).expect("valid base URL"),
    )
}

/// Base64 HMAC-SHA256 of `body`, as Shopify sends in `X-Shopify-Hmac-Sha256`.
///
/// # Panics
///
/// Never: HMAC accepts keys of any length.
#[must_use]
pub fn sign_webhook(body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("any key length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// 1x1 transparent PNG, base64.
pub const SIGNATURE_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Complete form fields, as the storefront posts them.
#[must_use]
pub fn form_fields(customer: CustomerId, codes: &str) -> Vec<(String, String)> {
    [
        ("customerId", customer.to_string()),
        ("name", "Dana Reyes".to_string()),
        ("company", "Reyes Biomedical".to_string()),
        ("address1", "100 Lab Way".to_string()),
        ("city", "Madison".to_string()),
        ("state", "WI".to_string()),
        ("postal", "53703".to_string()),
        ("country", "US".to_string()),
        ("telephone", "608-555-0100".to_string()),
        ("email", "dana@reyesbio.example".to_string()),
        ("productCodes", codes.to_string()),
        ("contactTissue", "Yes".to_string()),
        ("howForm", "Sheet".to_string()),
        ("implanted", "No".to_string()),
        ("protocol", "In vitro cytotoxicity screening".to_string()),
        ("printName", "Dana Reyes".to_string()),
        ("signature", format!("data:image/png;base64,{SIGNATURE_PNG}")),
        ("title", "Lab Director".to_string()),
        ("date", "2026-03-02".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// A valid form covering `codes`.
///
/// # Panics
///
/// Never: [`form_fields`] is complete.
#[must_use]
pub fn form(codes: &str) -> AffidavitForm {
    let fields: HashMap<String, String> = form_fields(CustomerId::new(1), codes)
        .into_iter()
        .collect();
    AffidavitForm::from_fields(&fields).expect("complete form")
}
