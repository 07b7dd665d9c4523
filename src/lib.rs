/// Bank Auth - account registration, email activation and JWT authentication
///
/// Users register with a password and a PIN, confirm their email with a
/// short-lived activation code, then exchange either secret for a signed
/// bearer token that protects every other route.
pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod crypto;
pub mod db;
pub mod error;
pub mod jwt;
pub mod mailer;
pub mod rate_limit;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{BankError, BankResult};
