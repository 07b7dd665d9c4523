/// Application context and component wiring
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db::{self, AccountRepository, SqliteAccountRepository},
    error::BankResult,
    jwt::{key_pair, SigningKey, TokenVerifier},
    mailer::{ActivationMailer, Mailer},
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<dyn AccountRepository>,
    pub account_manager: Arc<AccountManager>,
    pub token_verifier: TokenVerifier,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> BankResult<Self> {
        config.validate()?;

        let db = db::create_pool(&config.storage.database_path, db::DatabaseOptions::default())
            .await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let mailer = Mailer::new(config.email.clone())?;
        if !mailer.is_configured() {
            tracing::warn!("BANK_EMAIL_SMTP_URL not set, activation emails will only be logged");
        }

        Self::assemble(config, db, Arc::new(mailer))
    }

    /// Wire components over an existing pool and mail transport
    pub fn assemble(
        config: ServerConfig,
        db: SqlitePool,
        mailer: Arc<dyn ActivationMailer>,
    ) -> BankResult<Self> {
        let key = SigningKey::from_base64(&config.authentication.jwt_secret)?;
        let (issuer, verifier) = key_pair(&key);

        let accounts: Arc<dyn AccountRepository> =
            Arc::new(SqliteAccountRepository::new(db.clone()));

        let account_manager = AccountManager::new(
            Arc::clone(&accounts),
            mailer,
            issuer,
            verifier.clone(),
            config.jwt_ttl(),
            config.authentication.activation_url.clone(),
        );

        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Ok(Self {
            config: Arc::new(config),
            db,
            accounts,
            account_manager: Arc::new(account_manager),
            token_verifier: verifier,
            rate_limiter: Arc::new(rate_limiter),
        })
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.config.service.hostname, self.config.service.port)
    }
}
