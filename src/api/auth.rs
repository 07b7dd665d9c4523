/// Public registration, login and activation endpoints
use crate::{
    account::{
        validate_authentication, validate_registration, ActivateAccountQuery,
        AuthenticationRequest, AuthenticationResponse, RegistrationRequest,
    },
    context::AppContext,
    error::{BankError, BankResult, FieldError},
    rate_limit::auth_rate_limit,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Build /auth routes
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/authenticate", post(authenticate))
        .route("/auth/activate-account", get(activate_account))
        .route_layer(middleware::from_fn_with_state(ctx, auth_rate_limit))
}

fn body_error(rejection: JsonRejection) -> BankError {
    BankError::Validation(vec![FieldError::new("body", rejection.body_text())])
}

/// POST /auth/register
async fn register(
    State(ctx): State<AppContext>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> BankResult<StatusCode> {
    let Json(request) = payload.map_err(body_error)?;
    validate_registration(&request)?;

    ctx.account_manager.register(request).await?;

    Ok(StatusCode::ACCEPTED)
}

/// POST /auth/authenticate
async fn authenticate(
    State(ctx): State<AppContext>,
    payload: Result<Json<AuthenticationRequest>, JsonRejection>,
) -> BankResult<Json<AuthenticationResponse>> {
    let Json(request) = payload.map_err(body_error)?;
    validate_authentication(&request)?;

    let token = ctx.account_manager.authenticate(&request).await?;

    Ok(Json(AuthenticationResponse { token }))
}

/// GET /auth/activate-account?token=<code>
async fn activate_account(
    State(ctx): State<AppContext>,
    query: Result<Query<ActivateAccountQuery>, QueryRejection>,
) -> BankResult<Json<serde_json::Value>> {
    let Query(query) = query.map_err(|_| BankError::InvalidToken)?;

    ctx.account_manager.activate(&query.token).await?;

    Ok(Json(json!({ "message": "Account activated" })))
}

#[cfg(test)]
mod tests {
    use crate::{
        context::test_support::{registration_body, send, send_raw, test_context},
        error::ErrorResponse,
    };
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_register_accepts_valid_body() {
        let (ctx, mut outbox) = test_context().await;

        let (status, body) = send(
            &ctx,
            Method::POST,
            "/auth/register",
            Some(registration_body("a@x.com")),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_empty());
        assert_eq!(outbox.recv().await.unwrap().to, "a@x.com");
    }

    #[tokio::test]
    async fn test_register_reports_field_errors() {
        let (ctx, _outbox) = test_context().await;

        let (status, body) = send(
            &ctx,
            Method::POST,
            "/auth/register",
            Some(json!({ "email": "nope", "password": "short", "pin": "12" })),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let fields = error.field_errors.unwrap();
        for field in ["firstName", "lastName", "email", "password", "pin", "address"] {
            assert!(fields.contains_key(field), "missing {}", field);
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let (ctx, _outbox) = test_context().await;
        let body = registration_body("a@x.com");

        send(&ctx, Method::POST, "/auth/register", Some(body.clone()), None).await;
        let (status, body) = send(&ctx, Method::POST, "/auth/register", Some(body), None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "DuplicateIdentity");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (ctx, _outbox) = test_context().await;

        let response = send_raw(&ctx, Method::POST, "/auth/register", "{not json").await;

        assert_eq!(response, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_activate_and_authenticate() {
        let (ctx, mut outbox) = test_context().await;
        send(
            &ctx,
            Method::POST,
            "/auth/register",
            Some(registration_body("a@x.com")),
            None,
        )
        .await;
        let code = outbox.recv().await.unwrap().code;

        let (status, _) = send(
            &ctx,
            Method::GET,
            "/auth/activate-account?token=000000-not-a-code",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &ctx,
            Method::GET,
            &format!("/auth/activate-account?token={}", code),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &ctx,
            Method::GET,
            &format!("/auth/activate-account?token={}", code),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "TokenAlreadyUsed");

        let (status, body) = send(
            &ctx,
            Method::POST,
            "/auth/authenticate",
            Some(json!({ "email": "a@x.com", "password": "password1" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        let token = body["token"].as_str().unwrap();
        assert!(ctx.token_verifier.verify(token, "a@x.com"));
    }

    #[tokio::test]
    async fn test_authenticate_failures() {
        let (ctx, _outbox) = test_context().await;

        let (status, body) = send(
            &ctx,
            Method::POST,
            "/auth/authenticate",
            Some(json!({ "email": "ghost@x.com", "password": "password1" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "InvalidCredentials");

        let (status, body) = send(
            &ctx,
            Method::POST,
            "/auth/authenticate",
            Some(json!({ "email": "ghost@x.com" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "MissingCredential");
    }
}
