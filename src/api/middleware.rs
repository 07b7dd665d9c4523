/// Bearer authentication middleware
use crate::{auth::AuthContext, context::AppContext, error::BankError};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Require a valid bearer token and attach the caller's `AuthContext`
pub async fn require_bearer(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, BankError> {
    let token = extract_bearer_token(req.headers())
        .ok_or_else(|| BankError::Authentication("Missing authorization header".to_string()))?;

    let user = ctx.account_manager.validate_access_token(&token).await?;

    tracing::debug!(user_id = user.id, path = %req.uri().path(), "Authenticated request");

    req.extensions_mut().insert(AuthContext::from(&user));

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
