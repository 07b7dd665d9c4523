/// Bearer token (JWT) issuance and verification
///
/// Tokens are HS256-signed and self-contained: subject (the account email),
/// issued-at, expiry, plus whatever custom claims the caller merges in.
/// Nothing is persisted and tokens are never revoked server-side.

mod issuer;
mod verifier;

pub use issuer::TokenIssuer;
pub use verifier::TokenVerifier;

use crate::error::{BankError, BankResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Minimum HMAC key size in bytes (256 bits)
pub const MIN_KEY_BYTES: usize = 32;

/// Claim carrying the account holder's display name
pub const FULL_NAME_CLAIM: &str = "fullName";

/// Claim carrying the account's role names
pub const AUTHORITIES_CLAIM: &str = "authorities";

/// Registered claims that callers cannot override
const RESERVED_CLAIMS: [&str; 3] = ["sub", "iat", "exp"];

/// Symmetric signing key shared by issuer and verifier
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    /// Decode a base64 key, rejecting anything shorter than 256 bits
    pub fn from_base64(encoded: &str) -> BankResult<Self> {
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
            BankError::Configuration(format!("JWT secret is not valid base64: {}", e))
        })?;

        if bytes.len() < MIN_KEY_BYTES {
            return Err(BankError::Configuration(format!(
                "JWT secret must be at least 256 bits long (got {} bits)",
                bytes.len() * 8
            )));
        }

        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(**redacted**)")
    }
}

/// Claims carried by every bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearerClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BearerClaims {
    /// Look up a claim by name, registered claims included
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "sub" => Some(Value::String(self.sub.clone())),
            "iat" => Some(Value::from(self.iat)),
            "exp" => Some(Value::from(self.exp)),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Role names from the authorities claim
    pub fn authorities(&self) -> Vec<String> {
        self.extra
            .get(AUTHORITIES_CLAIM)
            .and_then(|v| v.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Build a matched issuer/verifier pair from one key
pub fn key_pair(key: &SigningKey) -> (TokenIssuer, TokenVerifier) {
    (TokenIssuer::new(key), TokenVerifier::new(key))
}
