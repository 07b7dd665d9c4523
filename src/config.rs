/// Configuration management for the bank authentication service
use crate::error::{BankError, BankResult};
use crate::jwt::SigningKey;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base64-encoded HMAC key, at least 256 bits once decoded
    pub jwt_secret: String,
    /// Bearer token lifetime in seconds
    pub jwt_expiration_secs: i64,
    /// Frontend page that receives `?token=<code>`
    pub activation_url: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests per second across the public /auth routes
    pub auth_requests_per_second: u32,
    /// Requests per second across bearer-protected routes
    pub authenticated_requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_requests_per_second: 10,
            authenticated_requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> BankResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("BANK_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("BANK_PORT")
            .unwrap_or_else(|_| "8088".to_string())
            .parse()
            .map_err(|_| BankError::Configuration("Invalid port number".to_string()))?;
        let version =
            env::var("BANK_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let database_path = env::var("BANK_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/bank_auth.sqlite"));

        let jwt_secret = env::var("BANK_JWT_SECRET")
            .map_err(|_| BankError::Configuration("BANK_JWT_SECRET is required".to_string()))?;
        let jwt_expiration_secs = env::var("BANK_JWT_EXPIRATION_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .map_err(|_| {
                BankError::Configuration("BANK_JWT_EXPIRATION_SECS must be an integer".to_string())
            })?;
        let activation_url = env::var("BANK_ACTIVATION_URL")
            .unwrap_or_else(|_| "http://localhost:4200/activate-account".to_string());

        let email = if let Ok(smtp_url) = env::var("BANK_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("BANK_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("contact@{}", hostname)),
            })
        } else {
            None
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            enabled: env::var("BANK_RATE_LIMITS_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enabled),
            auth_requests_per_second: env::var("BANK_RATE_LIMIT_AUTH_PER_SECOND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auth_requests_per_second),
            authenticated_requests_per_second: env::var("BANK_RATE_LIMIT_AUTHENTICATED_PER_SECOND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.authenticated_requests_per_second),
            burst_size: defaults.burst_size,
        };

        let logging = LoggingConfig {
            level: env::var("RUST_LOG")
                .unwrap_or_else(|_| "bank_auth=debug,tower_http=debug".to_string()),
            format: env::var("BANK_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig { database_path },
            authentication: AuthConfig {
                jwt_secret,
                jwt_expiration_secs,
                activation_url,
            },
            email,
            rate_limit,
            logging,
        })
    }

    /// Validate configuration
    ///
    /// An undersized or undecodable signing key is fatal here rather than
    /// surfacing on the first login.
    pub fn validate(&self) -> BankResult<()> {
        if self.service.hostname.is_empty() {
            return Err(BankError::Configuration("Hostname cannot be empty".to_string()));
        }

        SigningKey::from_base64(&self.authentication.jwt_secret)?;

        if self.authentication.jwt_expiration_secs <= 0 {
            return Err(BankError::Configuration(
                "JWT expiration must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Bearer token lifetime
    pub fn jwt_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.authentication.jwt_expiration_secs)
    }
}
