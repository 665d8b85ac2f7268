//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `AGAPE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `AGAPE_BASE_URL` - Public URL of this API (used for payment callbacks)
//! - `AGAPE_TOKEN_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `PAYSTACK_SECRET_KEY` - Paystack secret key (also signs webhooks)
//!
//! ## Optional
//! - `AGAPE_HOST` - Bind address (default: 127.0.0.1)
//! - `AGAPE_PORT` - Listen port (default: 4000)
//! - `AGAPE_FRONTEND_URL` - Web frontend origin for CORS and redirects (default: http://localhost:3000)
//! - `AGAPE_CURRENCY` - Store currency (default: GHS)
//! - `PAYSTACK_BASE_URL` - Paystack API base (default: https://api.paystack.co)
//! - `PAYSTACK_CALLBACK_URL` - Post-payment callback (default: `{base_url}/api/v1/payments/callback`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for human-readable

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use agape_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Web frontend origin (CORS allow-list and post-payment redirects)
    pub frontend_url: String,
    /// Access token signing secret
    pub token_secret: SecretString,
    /// Store currency
    pub currency: CurrencyCode,
    /// Paystack configuration
    pub paystack: PaystackConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON log lines
    pub json_logs: bool,
}

/// Paystack API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaystackConfig {
    /// API base URL
    pub base_url: String,
    /// Secret key (server-side only, also the webhook signing key)
    pub secret_key: SecretString,
    /// URL Paystack redirects the customer to after payment
    pub callback_url: String,
}

impl std::fmt::Debug for PaystackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackConfig")
            .field("base_url", &self.base_url)
            .field("secret_key", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl StorefrontConfig {
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

        let database_url = get_database_url("AGAPE_DATABASE_URL")?;
        let host = get_env_or_default("AGAPE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("AGAPE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("AGAPE_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("AGAPE_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("AGAPE_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let frontend_url = get_env_or_default("AGAPE_FRONTEND_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        let token_secret = get_validated_secret("AGAPE_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "AGAPE_TOKEN_SECRET")?;
        let currency = get_env_or_default("AGAPE_CURRENCY", "GHS")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("AGAPE_CURRENCY".to_string(), e))?;

        let paystack = PaystackConfig::from_env(&base_url)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            frontend_url,
            token_secret,
            currency,
            paystack,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
            json_logs: get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Fixed configuration for unit tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/agape_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 4000,
            base_url: "http://localhost:4000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            token_secret: SecretString::from("Zq8!rT2#vN5$kL9@wX4%mB7^cJ1&hF6*"),
            currency: CurrencyCode::GHS,
            paystack: PaystackConfig {
                base_url: "https://api.paystack.co".to_string(),
                secret_key: SecretString::from("sk_test_super_secret_value"),
                callback_url: "http://localhost:4000/api/v1/payments/callback".to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
            json_logs: false,
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl PaystackConfig {
    fn from_env(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("PAYSTACK_BASE_URL", "https://api.paystack.co")
                .trim_end_matches('/')
                .to_string(),
            secret_key: get_validated_secret("PAYSTACK_SECRET_KEY")?,
            callback_url: get_optional_env("PAYSTACK_CALLBACK_URL")
                .unwrap_or_else(|| format!("{base_url}/api/v1/payments/callback")),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
/// Database URL from `AGAPE_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Used by tools that need the database but not the rest of the config.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    get_database_url("AGAPE_DATABASE_URL")
}

fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., AGAPE_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional sample rate in `[0.0, 1.0]`.
fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
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
