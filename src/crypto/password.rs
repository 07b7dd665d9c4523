/// One-way hashing for passwords and PINs (Argon2id, PHC string format)
use crate::error::{BankError, BankResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a secret with a fresh random salt
pub fn hash_secret(secret: &str) -> BankResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BankError::Internal(format!("Password hashing failed: {}", e)))
}

/// Compare a secret against a stored hash.
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored credential hash could not be parsed: {}", e);
            false
        }
    }
}
