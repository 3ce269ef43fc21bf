//! Shop configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOP_BASE_URL` - Public URL of the API, used for cookie security
//! - `SHOP_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOP_PORT` - Listen port (default: 8000)
//! - `STRIPE_SECRET_KEY` - Stripe API key; Stripe checkout is disabled without it
//! - `STRIPE_WEBHOOK_SECRET` - Signing secret for `/api/payments/stripe/webhook`
//! - `STRIPE_CURRENCY` - Currency for payment intents (default: usd)
//! - `ANTHROPIC_API_KEY` - Claude API key; the assistant replies with a fixed
//!   notice without it
//! - `CLAUDE_MODEL` - Claude model ID (default: claude-sonnet-4-20250514)
//! - `CLOUDINARY_CLOUD_NAME` - Cloud name used to build product image URLs
//! - `SEARCH_REBUILD_RETRY_SECONDS` - Delay between index rebuild retries (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sample rates (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_REBUILD_RETRY_SECONDS: u64 = 300;

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

/// Shop application configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: Url,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Stripe gateway, `None` when no key is configured
    pub stripe: Option<StripeConfig>,
    /// Claude assistant, `None` when no key is configured
    pub claude: Option<ClaudeConfig>,
    /// Cloudinary cloud name for product image URLs
    pub cloudinary_cloud_name: Option<String>,
    /// Search index rebuild policy
    pub search: SearchConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: Option<SecretString>,
    /// Lower-case ISO currency for payment intents
    pub currency: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("currency", &self.currency)
            .finish()
    }
}

/// Claude AI API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ClaudeConfig {
    /// Anthropic API key
    pub api_key: SecretString,
    /// Model ID (e.g., claude-sonnet-4-20250514)
    pub model: String,
}

impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// Search index rebuild policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Delay before a skipped or failed rebuild is retried
    pub rebuild_retry_delay: Duration,
    /// Retries after the first attempt
    pub rebuild_max_retries: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rebuild_retry_delay: Duration::from_secs(DEFAULT_REBUILD_RETRY_SECONDS),
            rebuild_max_retries: 3,
        }
    }
}

impl ShopConfig {
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

        let database_url = get_database_url("SHOP_DATABASE_URL")?;
        let host = get_env_or_default("SHOP_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOP_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SHOP_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOP_PORT".to_string(), e.to_string()))?;
        let base_url = Url::parse(&get_required_env("SHOP_BASE_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("SHOP_BASE_URL".to_string(), e.to_string()))?;
        let session_secret = get_validated_secret("SHOP_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SHOP_SESSION_SECRET")?;

        let stripe = StripeConfig::from_env()?;
        let claude = ClaudeConfig::from_env()?;
        let search = SearchConfig::from_env()?;
        let cloudinary_cloud_name = get_optional_env("CLOUDINARY_CLOUD_NAME");

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            stripe,
            claude,
            cloudinary_cloud_name,
            search,
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

    /// Whether cookies must be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

impl StripeConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = get_optional_validated_secret("STRIPE_SECRET_KEY")? else {
            return Ok(None);
        };
        let currency = get_env_or_default("STRIPE_CURRENCY", "usd").to_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar(
                "STRIPE_CURRENCY".to_string(),
                format!("expected a three-letter ISO code, got {currency:?}"),
            ));
        }

        Ok(Some(Self {
            secret_key,
            webhook_secret: get_optional_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            currency,
        }))
    }
}

impl ClaudeConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        Ok(
            get_optional_validated_secret("ANTHROPIC_API_KEY")?.map(|api_key| Self {
                api_key,
                model: get_env_or_default("CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
            }),
        )
    }
}

impl SearchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let seconds = get_optional_env("SEARCH_REBUILD_RETRY_SECONDS")
            .map(|s| {
                s.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "SEARCH_REBUILD_RETRY_SECONDS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_REBUILD_RETRY_SECONDS);

        Ok(Self {
            rebuild_retry_delay: Duration::from_secs(seconds),
            ..Self::default()
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
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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

/// Load and validate a required secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Load and validate a secret only if it is set.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            validate_secret_strength(&value, key)?;
            Ok(SecretString::from(value))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    pub(crate) fn test_config() -> ShopConfig {
        ShopConfig {
            database_url: SecretString::from("postgres://localhost/shop_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8000,
            base_url: Url::parse("http://localhost:8000").unwrap(),
            session_secret: SecretString::from("x".repeat(32)),
            stripe: None,
            claude: None,
            cloudinary_cloud_name: None,
            search: SearchConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

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
        let result = validate_secret_strength("your-stripe-key-here", "STRIPE_SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_accepts_stripe_style_keys() {
        assert!(validate_secret_strength("sk_test_51Hq9ZbK2vT8mN3pR7xW4yL", "STRIPE_SECRET_KEY").is_ok());
        assert!(validate_secret_strength("whsec_Zk8Jd02mQpL5vR9tXy3NcB", "STRIPE_WEBHOOK_SECRET").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_socket_addr_and_scheme() {
        let mut config = test_config();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8000");
        assert!(!config.is_https());
        config.base_url = Url::parse("https://shop.example.org").unwrap();
        assert!(config.is_https());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let stripe = StripeConfig {
            secret_key: SecretString::from("sk_live_very_private"),
            webhook_secret: Some(SecretString::from("whsec_very_private")),
            currency: "usd".to_string(),
        };
        let claude = ClaudeConfig {
            api_key: SecretString::from("sk-ant-very-private"),
            model: DEFAULT_CLAUDE_MODEL.to_string(),
        };
        let output = format!("{stripe:?} {claude:?}");
        assert!(output.contains("[REDACTED]"));
        assert!(output.contains("usd"));
        assert!(!output.contains("very_private"));
        assert!(!output.contains("very-private"));
    }

    #[test]
    fn test_search_config_default() {
        let search = SearchConfig::default();
        assert_eq!(search.rebuild_retry_delay, Duration::from_secs(300));
        assert_eq!(search.rebuild_max_retries, 3);
    }
}

#[cfg(test)]
pub(crate) use tests::test_config;
