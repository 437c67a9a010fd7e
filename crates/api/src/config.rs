//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GEMVAULT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `GEMVAULT_BASE_URL` - Public URL of the API
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `GEMVAULT_HOST` - Bind address (default: 127.0.0.1)
//! - `GEMVAULT_PORT` - Listen port (default: 5000)
//! - `GEMVAULT_FRONTEND_URL` - Frontend origin for CORS and email links (default: base URL)
//! - `JWT_EXPIRY_HOURS` - Token lifetime (default: 24)
//! - `UPLOAD_DIR` - Directory for uploaded files (default: uploads)
//! - `IMAGE_API_KEY` - Image generation API key (designs use placeholders without it)
//! - `IMAGE_API_URL` - Image generation endpoint (default: `OpenAI` images API)
//! - `IMAGE_MODEL` - Image model name (default: gpt-image-1)
//! - `IMAGE_SIZE` - Generated image size (default: 1024x1024)
//! - `DESIGN_IMAGE_COUNT` - Images per new design, 1-4 (default: 2)
//! - `BLOB_STORAGE_URL` / `BLOB_STORAGE_TOKEN` - Remote storage for generated images
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` - Outgoing email
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `RATE_LIMIT_ENABLED` - `false` to turn off per-IP limits, e.g. for integration tests (default: true)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_IMAGE_API_URL: &str = "https://api.openai.com/v1/images/generations";
const MAX_DESIGN_IMAGE_COUNT: u8 = 4;

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

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Frontend origin (CORS, links in emails)
    pub frontend_url: String,
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// Root directory for uploaded files
    pub upload_dir: PathBuf,
    /// Image generation API (designs fall back to placeholders when absent)
    pub image_generation: Option<ImageGenerationConfig>,
    /// Remote blob storage for generated images (local disk when absent)
    pub blob_storage: Option<BlobStorageConfig>,
    /// Number of images generated for a new design
    pub design_image_count: u8,
    /// SMTP configuration (reset links are logged when absent)
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Apply per-IP rate limits to `/api`
    pub rate_limit: bool,
}

/// JWT signing configuration.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: SecretString,
    /// Token lifetime in hours
    pub expiry_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expiry_hours", &self.expiry_hours)
            .finish()
    }
}

/// Image generation API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ImageGenerationConfig {
    /// API key sent as a bearer token
    pub api_key: SecretString,
    /// Generation endpoint URL
    pub api_url: String,
    /// Model name
    pub model: String,
    /// Image size (e.g. 1024x1024)
    pub size: String,
}

impl std::fmt::Debug for ImageGenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerationConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("size", &self.size)
            .finish()
    }
}

/// Remote blob storage configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct BlobStorageConfig {
    /// Base URL that objects are `PUT` under
    pub base_url: String,
    /// Bearer token for uploads
    pub token: SecretString,
}

impl std::fmt::Debug for BlobStorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStorageConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// SMTP email configuration.
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
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ApiConfig {
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

        let database_url = get_database_url("GEMVAULT_DATABASE_URL")?;
        let host = get_env_or_default("GEMVAULT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GEMVAULT_HOST".to_string(), e.to_string()))?;
        let port = parse_env_or_default("GEMVAULT_PORT", 5000_u16)?;
        let base_url = get_required_env("GEMVAULT_BASE_URL")?;
        validate_url(&base_url, "GEMVAULT_BASE_URL")?;
        let frontend_url =
            get_optional_env("GEMVAULT_FRONTEND_URL").unwrap_or_else(|| base_url.clone());
        validate_url(&frontend_url, "GEMVAULT_FRONTEND_URL")?;

        let jwt = JwtConfig::from_env()?;
        let upload_dir = PathBuf::from(get_env_or_default("UPLOAD_DIR", "uploads"));
        let image_generation = ImageGenerationConfig::from_env()?;
        let blob_storage = BlobStorageConfig::from_env()?;
        let design_image_count = parse_env_or_default("DESIGN_IMAGE_COUNT", 2_u8)?;
        if design_image_count == 0 || design_image_count > MAX_DESIGN_IMAGE_COUNT {
            return Err(ConfigError::InvalidEnvVar(
                "DESIGN_IMAGE_COUNT".to_string(),
                format!("must be between 1 and {MAX_DESIGN_IMAGE_COUNT}"),
            ));
        }
        let email = EmailConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let log_json = get_optional_env("LOG_FORMAT").is_some_and(|f| f == "json");
        let rate_limit = parse_env_or_default("RATE_LIMIT_ENABLED", true)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            frontend_url,
            jwt,
            upload_dir,
            image_generation,
            blob_storage,
            design_image_count,
            email,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            log_json,
            rate_limit,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&secret, "JWT_SECRET")?;
        let expiry_hours = parse_env_or_default("JWT_EXPIRY_HOURS", 24_i64)?;
        if expiry_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "JWT_EXPIRY_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            secret,
            expiry_hours,
        })
    }
}

impl ImageGenerationConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("IMAGE_API_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&api_key, "IMAGE_API_KEY")?;

        let api_url = get_env_or_default("IMAGE_API_URL", DEFAULT_IMAGE_API_URL);
        validate_url(&api_url, "IMAGE_API_URL")?;

        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            api_url,
            model: get_env_or_default("IMAGE_MODEL", "gpt-image-1"),
            size: get_env_or_default("IMAGE_SIZE", "1024x1024"),
        }))
    }
}

impl BlobStorageConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("BLOB_STORAGE_URL"),
            get_optional_env("BLOB_STORAGE_TOKEN"),
        ) {
            (Some(base_url), Some(token)) => {
                validate_url(&base_url, "BLOB_STORAGE_URL")?;
                validate_secret_strength(&token, "BLOB_STORAGE_TOKEN")?;
                Ok(Some(Self {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    token: SecretString::from(token),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "BLOB_STORAGE_*".to_string(),
                "Both BLOB_STORAGE_URL and BLOB_STORAGE_TOKEN must be set together".to_string(),
            )),
        }
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env_or_default("SMTP_PORT", 587_u16)?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

#[cfg(test)]
impl ApiConfig {
    /// Configuration for unit tests: no external services, uploads under `upload_dir`.
    pub(crate) fn for_tests(upload_dir: PathBuf) -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/gemvault_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            jwt: JwtConfig {
                secret: SecretString::from("q8Z!r2Lx#7vN@4mKp9$Wt6&yB3^hF1cD"),
                expiry_hours: 24,
            },
            upload_dir,
            image_generation: None,
            blob_storage: None,
            design_image_count: 2,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            log_json: false,
            rate_limit: true,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
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

/// Parse an environment variable, using a default when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Validate that a value is an absolute http(s) URL.
fn validate_url(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(())
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
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
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-here", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://api.gemvault.test", "X").is_ok());
        assert!(validate_url("ftp://files.gemvault.test", "X").is_err());
        assert!(validate_url("not a url", "X").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = ApiConfig::for_tests(PathBuf::from("uploads")).socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let jwt = JwtConfig {
            secret: SecretString::from("super_secret_signing_key"),
            expiry_hours: 1,
        };
        let blob = BlobStorageConfig {
            base_url: "https://blob.gemvault.test".to_string(),
            token: SecretString::from("super_secret_blob_token"),
        };

        let debug_output = format!("{jwt:?} {blob:?}");

        assert!(debug_output.contains("https://blob.gemvault.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_signing_key"));
        assert!(!debug_output.contains("super_secret_blob_token"));
    }
}
