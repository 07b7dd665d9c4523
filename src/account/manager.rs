/// Account workflow: registration, activation and authentication
///
/// Every collaborator arrives through the constructor; `AppContext::new`
/// wires the concrete ones.

use crate::{
    account::{AuthenticationRequest, RegistrationRequest, Secret},
    crypto::{
        activation_code::ACTIVATION_CODE_LENGTH, generate_activation_code, hash_secret,
        verify_secret,
    },
    db::{
        account::{NewActivationToken, NewUser, User},
        AccountRepository, TokenRepository, UserRepository,
    },
    error::{BankError, BankResult},
    jwt::{TokenIssuer, TokenVerifier, AUTHORITIES_CLAIM, FULL_NAME_CLAIM},
    mailer::{ActivationEmail, ActivationMailer},
};
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Account manager service
pub struct AccountManager {
    repo: Arc<dyn AccountRepository>,
    mailer: Arc<dyn ActivationMailer>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    jwt_ttl: Duration,
    activation_url: String,
    /// Verified against on unknown emails so every login pays one Argon2 check
    dummy_hash: String,
}

impl AccountManager {
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        mailer: Arc<dyn ActivationMailer>,
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        jwt_ttl: Duration,
        activation_url: String,
    ) -> Self {
        Self {
            repo,
            mailer,
            issuer,
            verifier,
            jwt_ttl,
            activation_url,
            dummy_hash: hash_secret("unused-login-credential").unwrap_or_default(),
        }
    }

    /// Create a disabled account and email its first activation code.
    ///
    /// The request must already have passed `validate_registration`.
    pub async fn register(&self, request: RegistrationRequest) -> BankResult<User> {
        if self.repo.find_by_email(&request.email).await?.is_some() {
            return Err(BankError::DuplicateIdentity(request.email));
        }

        let address = request
            .address
            .ok_or_else(|| BankError::Internal("Registration without address".to_string()))?;

        let now = Utc::now();
        let new_user = NewUser {
            password_hash: hash_secret(&request.password)?,
            pin_hash: hash_secret(&request.pin)?,
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            address: address.into(),
            created_at: now,
        };
        let token = NewActivationToken::new(generate_activation_code(ACTIVATION_CODE_LENGTH), now);

        let (user, token) = self.repo.create_pending_account(new_user, token).await?;

        tracing::info!(user_id = user.id, email = %user.email, "Registered pending account");

        self.dispatch_activation_email(&user, token.token);

        Ok(user)
    }

    /// Consume an activation code and enable its account.
    ///
    /// An expired code is replaced: a fresh one is stored and mailed, and
    /// the call still fails with `TokenExpired`.
    pub async fn activate(&self, code: &str) -> BankResult<()> {
        let token = self
            .repo
            .find_by_token(code)
            .await?
            .ok_or(BankError::InvalidToken)?;

        if token.is_consumed() {
            return Err(BankError::TokenAlreadyUsed);
        }

        let now = Utc::now();

        if token.is_expired_at(now) {
            let user = self
                .repo
                .find_by_id(token.user_id)
                .await?
                .ok_or_else(|| BankError::NotFound("User not found".to_string()))?;

            let replacement = self
                .repo
                .save(
                    user.id,
                    NewActivationToken::new(generate_activation_code(ACTIVATION_CODE_LENGTH), now),
                )
                .await?;

            tracing::info!(
                user_id = user.id,
                expired_token_id = token.id,
                "Activation code expired, issued replacement"
            );

            self.dispatch_activation_email(&user, replacement.token);
            return Err(BankError::TokenExpired);
        }

        if !self.repo.consume_activation(token.id, now).await? {
            return Err(BankError::TokenAlreadyUsed);
        }

        tracing::info!(user_id = token.user_id, token_id = token.id, "Account activated");

        Ok(())
    }

    /// Check email plus password or PIN and mint a bearer token
    pub async fn authenticate(&self, request: &AuthenticationRequest) -> BankResult<String> {
        let secret = request.secret()?;

        let Some(user) = self.repo.find_by_email(&request.email).await? else {
            let secret = match secret {
                Secret::Password(value) | Secret::Pin(value) => value,
            };
            verify_secret(secret, &self.dummy_hash);
            tracing::debug!(email = %request.email, "Rejected login attempt");
            return Err(BankError::InvalidCredentials);
        };

        let matches = match secret {
            Secret::Password(password) => verify_secret(password, &user.password_hash),
            Secret::Pin(pin) => verify_secret(pin, &user.pin_hash),
        };

        if !matches {
            tracing::debug!(email = %request.email, "Rejected login attempt");
            return Err(BankError::InvalidCredentials);
        }

        ensure_usable(&user)?;

        let token = self.issuer.issue(&user.email, bearer_claims(&user), self.jwt_ttl)?;

        tracing::info!(user_id = user.id, "Issued bearer token");

        Ok(token)
    }

    /// Resolve a bearer token to the account it was issued for
    pub async fn validate_access_token(&self, token: &str) -> BankResult<User> {
        let subject = self.verifier.extract_subject(token)?;

        let user = self
            .repo
            .find_by_email(&subject)
            .await?
            .ok_or_else(|| BankError::Authentication("Unknown token subject".to_string()))?;

        if !self.verifier.verify(token, &user.email) {
            return Err(BankError::Authentication("Invalid token".to_string()));
        }

        ensure_usable(&user)?;

        Ok(user)
    }

    /// Send the code in a detached task; failures are logged only
    fn dispatch_activation_email(&self, user: &User, code: String) {
        let mailer = Arc::clone(&self.mailer);
        let email = ActivationEmail {
            to: user.email.clone(),
            full_name: user.full_name(),
            code,
            activation_url: self.activation_url.clone(),
        };

        tokio::spawn(async move {
            if let Err(e) = mailer.send_activation_email(&email).await {
                tracing::error!(to = %email.to, "Failed to send activation email: {}", e);
            }
        });
    }
}

fn ensure_usable(user: &User) -> BankResult<()> {
    if user.account_locked {
        return Err(BankError::AccountLocked);
    }
    if !user.enabled {
        return Err(BankError::AccountDisabled);
    }
    Ok(())
}

fn bearer_claims(user: &User) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert(FULL_NAME_CLAIM.to_string(), Value::String(user.full_name()));
    claims.insert(
        AUTHORITIES_CLAIM.to_string(),
        Value::from(user.role_names()),
    );
    claims
}
