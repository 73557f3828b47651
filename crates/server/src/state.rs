//! Application state shared across handlers.

use std::sync::Arc;

use lettre::transport::smtp::Error as SmtpError;
use secrecy::SecretString;

use crate::config::{GateConfig, ServerConfig};
use crate::platform::{CachedCatalog, Platform};
use crate::services::{
    AffidavitService, EmailService, LogNotifier, Notifier, OrderGate, ReviewLinkSigner,
};
use crate::shopify::AdminClient;
use crate::store::{MetafieldStore, SubmissionStore};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    affidavits: AffidavitService,
    gate: OrderGate,
    webhook_secret: SecretString,
}

/// Collaborators the state is assembled from.
pub struct Components {
    pub store: Arc<dyn SubmissionStore>,
    pub platform: Arc<dyn Platform>,
    pub notifier: Arc<dyn Notifier>,
    pub signer: ReviewLinkSigner,
    pub webhook_secret: SecretString,
    pub gate: GateConfig,
}

impl AppState {
    /// Assemble state from explicit collaborators.
    #[must_use]
    pub fn new(components: Components) -> Self {
        let Components {
            store,
            platform,
            notifier,
            signer,
            webhook_secret,
            gate,
        } = components;

        Self {
            inner: Arc::new(AppStateInner {
                affidavits: AffidavitService::new(
                    Arc::clone(&store),
                    Arc::clone(&platform),
                    notifier,
                    signer,
                ),
                gate: OrderGate::new(store, platform, gate),
                webhook_secret,
            }),
        }
    }

    /// Build production state: Shopify-backed store and platform, SMTP
    /// notices when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn from_config(config: &ServerConfig) -> Result<Self, SmtpError> {
        let client = AdminClient::new(&config.shopify);

        let notifier: Arc<dyn Notifier> = match config.email() {
            Some(email) => Arc::new(EmailService::new(email)?),
            None => {
                tracing::warn!("SMTP not configured; notices will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self::new(Components {
            store: Arc::new(MetafieldStore::new(client.clone())),
            platform: Arc::new(CachedCatalog::new(client)),
            notifier,
            signer: ReviewLinkSigner::new(
                config.review_link_secret.clone(),
                config.base_url.clone(),
            ),
            webhook_secret: config.webhook_secret.clone(),
            gate: config.gate,
        }))
    }

    /// Affidavit workflow.
    #[must_use]
    pub fn affidavits(&self) -> &AffidavitService {
        &self.inner.affidavits
    }

    /// Order gate.
    #[must_use]
    pub fn gate(&self) -> &OrderGate {
        &self.inner.gate
    }

    /// Secret Shopify signs webhooks with.
    #[must_use]
    pub fn webhook_secret(&self) -> &SecretString {
        &self.inner.webhook_secret
    }
}
