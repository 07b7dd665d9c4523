/// Cryptographic helpers: credential hashing and activation code generation

pub mod activation_code;
pub mod password;

pub use activation_code::generate_activation_code;
pub use password::{hash_secret, verify_secret};
