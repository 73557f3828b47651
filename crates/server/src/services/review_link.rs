//! Signed reviewer links.
//!
//! Reviewers act on a submission through a link in the notification email.
//! The link carries `token = hex(HMAC-SHA256(secret, "{customer_id}:{submission_id}"))`
//! so approve/reject requests can be authorized without a session.

use affidavit_core::{CustomerId, SubmissionId};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies reviewer tokens.
#[derive(Clone)]
pub struct ReviewLinkSigner {
    secret: SecretString,
    base_url: Url,
}

impl std::fmt::Debug for ReviewLinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewLinkSigner")
            .field("secret", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ReviewLinkSigner {
    #[must_use]
    pub const fn new(secret: SecretString, base_url: Url) -> Self {
        Self { secret, base_url }
    }

    fn mac(&self, customer: CustomerId, submission: &SubmissionId) -> HmacSha256 {
        // HMAC accepts keys of any length.
        #[allow(clippy::expect_used)]
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC key of any size");
        mac.update(format!("{}:{}", customer.as_u64(), submission.as_str()).as_bytes());
        mac
    }

    /// Token for a submission.
    #[must_use]
    pub fn token(&self, customer: CustomerId, submission: &SubmissionId) -> String {
        hex::encode(self.mac(customer, submission).finalize().into_bytes())
    }

    /// Whether `token` was issued for this submission. Constant time.
    #[must_use]
    pub fn verify(&self, customer: CustomerId, submission: &SubmissionId, token: &str) -> bool {
        let Ok(provided) = hex::decode(token.trim()) else {
            return false;
        };
        self.mac(customer, submission).verify_slice(&provided).is_ok()
    }

    /// Absolute URL of the review page for a submission.
    #[must_use]
    pub fn review_url(&self, customer: CustomerId, submission: &SubmissionId) -> String {
        let mut url = self.base_url.clone();
        url.set_path(&format!(
            "/review/{}/{}",
            customer.as_u64(),
            submission.as_str()
        ));
        url.query_pairs_mut()
            .clear()
            .append_pair("token", &self.token(customer, submission));
        url.to_string()
    }
}
