/// Security context for authenticated requests
use crate::{db::account::{Role, User}, error::BankError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Identity and roles resolved from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub roles: Vec<Role>,
}

impl AuthContext {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<&User> for AuthContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            full_name: user.full_name(),
            roles: user.roles.clone(),
        }
    }
}

/// Reads the context the bearer middleware stored in the request extensions
#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = BankError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| BankError::Authentication("Missing authorization header".to_string()))
    }
}
