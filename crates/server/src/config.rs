//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `APP_BASE_URL` - Public URL of this service (used in review links)
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_ACCESS_TOKEN` - Admin API access token of the custom app
//! - `SHOPIFY_WEBHOOK_SECRET` - Secret used to sign webhook deliveries (server only)
//! - `REVIEW_LINK_SECRET` - Signing key for reviewer links (min 32 chars, high entropy)
//!
//! ## Optional
//! - `APP_HOST` - Bind address (default: 0.0.0.0)
//! - `APP_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_API_VERSION` - API version (default: 2025-01)
//! - `METAFIELD_NAMESPACE` - App metafield namespace (default: app--factor2-affidavit)
//! - `GATE_HOLD_WITHOUT_SUBMISSION` - Hold gated orders with no submission at all (default: false)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (SMTP - all or none; notices are only logged without it)
//! - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `SMTP_FROM` - Sender address
//! - `REVIEWER_EMAIL` - Address that receives new submissions

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SIGNING_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default metafield namespace owned by the app.
pub const DEFAULT_NAMESPACE: &str = "app--factor2-affidavit";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used to build reviewer links
    pub base_url: Url,
    /// Key for signing reviewer links
    pub review_link_secret: SecretString,
    /// Secret Shopify signs webhook deliveries with
    pub webhook_secret: SecretString,
    /// Shopify Admin API configuration
    pub shopify: ShopifyConfig,
    /// Order gate behaviour
    pub gate: GateConfig,
    /// SMTP configuration (optional; notices are logged when absent)
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Shopify Admin API configuration.
///
/// Implements `Debug` manually to redact the credentials.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2025-01)
    pub api_version: String,
    /// Admin API access token
    pub access_token: SecretString,
    /// Namespace of the app-owned metafields
    pub namespace: String,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("access_token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Order gate configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateConfig {
    /// Hold gated orders whose customer has neither an approval nor a
    /// pending submission.
    pub hold_without_submission: bool,
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
    /// Reviewer inbox for new submissions
    pub reviewer_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("reviewer_address", &self.reviewer_address)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("APP_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("APP_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("APP_PORT".to_string(), e.to_string()))?;
        let base_url = Url::parse(&get_required_env("APP_BASE_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("APP_BASE_URL".to_string(), e.to_string()))?;
        let review_link_secret = get_validated_secret("REVIEW_LINK_SECRET")?;
        validate_signing_secret(&review_link_secret, "REVIEW_LINK_SECRET")?;
        let webhook_secret = get_validated_secret("SHOPIFY_WEBHOOK_SECRET")?;

        let shopify = ShopifyConfig::from_env()?;
        let gate = GateConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            host,
            port,
            base_url,
            review_link_secret,
            webhook_secret,
            shopify,
            gate,
            email,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns a reference to the SMTP configuration, if available.
    #[must_use]
    pub const fn email(&self) -> Option<&EmailConfig> {
        self.email.as_ref()
    }
}

impl ShopifyConfig {
    /// Load the Shopify settings alone (used by the operator CLI).
    ///
    /// Only the Admin API credentials are read; the webhook secret belongs
    /// to [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a secret
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: get_required_env("SHOPIFY_STORE")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2025-01"),
            access_token: get_validated_secret("SHOPIFY_ACCESS_TOKEN")?,
            namespace: get_env_or_default("METAFIELD_NAMESPACE", DEFAULT_NAMESPACE),
        })
    }
}

impl GateConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let hold_without_submission = match get_optional_env("GATE_HOLD_WITHOUT_SUBMISSION") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "GATE_HOLD_WITHOUT_SUBMISSION".to_string(),
                    format!("expected true or false, got '{raw}'"),
                )
            })?,
            None => false,
        };
        Ok(Self {
            hold_without_submission,
        })
    }
}

impl EmailConfig {
    /// Load SMTP configuration from environment.
    ///
    /// Returns `None` when no SMTP variable is set. Setting only some of them
    /// is an error.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        const KEYS: [&str; 5] = [
            "SMTP_HOST",
            "SMTP_USERNAME",
            "SMTP_PASSWORD",
            "SMTP_FROM",
            "REVIEWER_EMAIL",
        ];

        let present = KEYS
            .iter()
            .filter(|key| get_optional_env(key).is_some())
            .count();
        if present == 0 {
            return Ok(None);
        }
        if present < KEYS.len() {
            return Err(ConfigError::InvalidEnvVar(
                "SMTP_*".to_string(),
                format!("{} must be set together", KEYS.join(", ")),
            ));
        }

        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
            reviewer_address: get_required_env("REVIEWER_EMAIL")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_signing_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SIGNING_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SIGNING_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-webhook-secret", "SHOPIFY_WEBHOOK_SECRET")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        assert!(validate_secret_strength(&"ab".repeat(20), "REVIEW_LINK_SECRET").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_signing_secret_length() {
        assert!(validate_signing_secret(&SecretString::from("short"), "REVIEW_LINK_SECRET").is_err());
        assert!(
            validate_signing_secret(&SecretString::from("k".repeat(32)), "REVIEW_LINK_SECRET")
                .is_ok()
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_shopify_config_debug_redacts_secrets() {
        let config = ShopifyConfig {
            store: "factor2.myshopify.com".to_string(),
            api_version: "2025-01".to_string(),
            access_token: SecretString::from("shpat_0123456789abcdef"),
            namespace: DEFAULT_NAMESPACE.to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("factor2.myshopify.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpat_0123456789abcdef"));
    }

    #[test]
    fn test_email_config_debug_redacts_secrets() {
        let config = EmailConfig {
            smtp_host: "smtp.mailhost.test".to_string(),
            smtp_port: 587,
            smtp_username: "affidavits".to_string(),
            smtp_password: SecretString::from("super_secret_smtp_password"),
            from_address: "affidavits@factor2.test".to_string(),
            reviewer_address: "compliance@factor2.test".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("compliance@factor2.test"));
        assert!(!debug_output.contains("super_secret_smtp_password"));
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_shopify_config_ignores_webhook_secret() {
        // SAFETY: env mutation is confined to this test's unique variables.
        unsafe {
            std::env::set_var("SHOPIFY_STORE", "factor2.myshopify.com");
            std::env::set_var("SHOPIFY_ACCESS_TOKEN", "shpat_9fK2mQ7xL4vB8nR1tZ6wC3");
            std::env::remove_var("SHOPIFY_WEBHOOK_SECRET");
        }

        let config = ShopifyConfig::from_env().unwrap();
        assert_eq!(config.store, "factor2.myshopify.com");
    }
}
