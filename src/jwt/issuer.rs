use super::{BearerClaims, SigningKey, RESERVED_CLAIMS};
use crate::error::{BankError, BankResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{Map, Value};

/// Mints signed bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(key: &SigningKey) -> Self {
        Self {
            key: EncodingKey::from_secret(key.as_bytes()),
        }
    }

    /// Issue a token for `subject` valid for `ttl`, with `claims` merged in.
    ///
    /// `sub`, `iat` and `exp` always come from the arguments, never from
    /// `claims`.
    pub fn issue(
        &self,
        subject: &str,
        mut claims: Map<String, Value>,
        ttl: Duration,
    ) -> BankResult<String> {
        for reserved in RESERVED_CLAIMS {
            claims.remove(reserved);
        }

        let now = Utc::now();
        let claims = BearerClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            extra: claims,
        };

        encode(&Header::default(), &claims, &self.key)
            .map_err(|e| BankError::Jwt(format!("Failed to generate token: {}", e)))
    }
}
