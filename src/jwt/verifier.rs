use super::{BearerClaims, SigningKey};
use crate::error::{BankError, BankResult};
use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde_json::Value;

/// Validates bearer tokens against the configured signing key
///
/// Pure with respect to the token string and the key: no store lookups.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(key: &SigningKey) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: no clock skew allowance
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }

    /// Check the signature and expiry and return the claims
    pub fn decode(&self, token: &str) -> BankResult<BearerClaims> {
        let data = decode::<BearerClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!("JWT verification failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    BankError::Authentication("Token has expired".to_string())
                }
                ErrorKind::InvalidSignature => {
                    BankError::Authentication("Invalid token signature".to_string())
                }
                _ => BankError::Authentication("Malformed token".to_string()),
            }
        })?;

        // jsonwebtoken accepts exp == now; a token is only valid strictly before expiry
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(BankError::Authentication("Token has expired".to_string()));
        }

        Ok(data.claims)
    }

    /// True only for a correctly signed, unexpired token whose subject is `expected_subject`
    pub fn verify(&self, token: &str, expected_subject: &str) -> bool {
        match self.decode(token) {
            Ok(claims) => claims.sub == expected_subject,
            Err(_) => false,
        }
    }

    pub fn extract_subject(&self, token: &str) -> BankResult<String> {
        self.decode(token).map(|claims| claims.sub)
    }

    pub fn extract_claim(&self, token: &str, name: &str) -> BankResult<Option<Value>> {
        self.decode(token).map(|claims| claims.get(name))
    }
}
