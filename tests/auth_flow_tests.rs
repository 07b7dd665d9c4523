//! End-to-end account lifecycle through the HTTP router

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use bank_auth::{
    config::{AuthConfig, LoggingConfig, RateLimitConfig, ServiceConfig, StorageConfig},
    db::{self, TokenRepository, UserRepository},
    mailer::{ActivationEmail, ActivationMailer},
    server::build_router,
    AppContext, BankResult, ServerConfig,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

struct ChannelMailer(mpsc::UnboundedSender<ActivationEmail>);

#[async_trait]
impl ActivationMailer for ChannelMailer {
    async fn send_activation_email(&self, email: &ActivationEmail) -> BankResult<()> {
        let _ = self.0.send(email.clone());
        Ok(())
    }
}

struct Harness {
    ctx: AppContext,
    router: Router,
    outbox: mpsc::UnboundedReceiver<ActivationEmail>,
}

fn config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 0,
            version: "it".to_string(),
        },
        storage: StorageConfig {
            database_path: PathBuf::from(":memory:"),
        },
        authentication: AuthConfig {
            jwt_secret: STANDARD.encode([9u8; 48]),
            jwt_expiration_secs: 600,
            activation_url: "https://bank.example/activate-account".to_string(),
        },
        email: None,
        rate_limit: RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
    }
}

async fn harness() -> Harness {
    let pool = assert_ok!(db::create_memory_pool().await);
    let (sender, outbox) = mpsc::unbounded_channel();
    let ctx = assert_ok!(AppContext::assemble(config(), pool, Arc::new(ChannelMailer(sender))));
    let router = build_router(ctx.clone());
    Harness { ctx, router, outbox }
}

impl Harness {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

fn registration(email: &str) -> Value {
    json!({
        "firstName": "Grace",
        "lastName": "Hopper",
        "email": email,
        "password": "password1",
        "pin": "1234",
        "address": {
            "street": "1 Compiler Way",
            "city": "Arlington",
            "county": "Arlington",
            "postalCode": "22201",
            "country": "US"
        }
    })
}

#[tokio::test]
async fn register_activate_authenticate_and_call_protected_route() {
    let mut h = harness().await;

    let (status, body) = h
        .call(Method::POST, "/auth/register", Some(registration("a@x.com")), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);

    let email = h.outbox.recv().await.unwrap();
    assert_eq!(email.to, "a@x.com");
    assert_eq!(email.full_name, "Grace Hopper");
    assert_eq!(
        email.link(),
        format!("https://bank.example/activate-account?token={}", email.code)
    );

    // Not yet activated
    let (status, body) = h
        .call(
            Method::POST,
            "/auth/authenticate",
            Some(json!({ "email": "a@x.com", "password": "password1" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AccountDisabled");

    let (status, body) = h
        .call(Method::GET, "/auth/activate-account?token=nope00", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidToken");

    let activate = format!("/auth/activate-account?token={}", email.code);
    let (status, _) = h.call(Method::GET, &activate, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.call(Method::GET, &activate, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "TokenAlreadyUsed");

    let (status, body) = h
        .call(
            Method::POST,
            "/auth/authenticate",
            Some(json!({ "email": "a@x.com", "pin": "1234" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    assert!(h.ctx.token_verifier.verify(&token, "a@x.com"));
    assert!(!h.ctx.token_verifier.verify(&token, "b@x.com"));
    assert_eq!(assert_ok!(h.ctx.token_verifier.extract_subject(&token)), "a@x.com");
    assert_eq!(
        assert_ok!(h.ctx.token_verifier.extract_claim(&token, "fullName")),
        Some(json!("Grace Hopper"))
    );
    assert_eq!(
        assert_ok!(h.ctx.token_verifier.extract_claim(&token, "authorities")),
        Some(json!(["ROLE_USER"]))
    );

    let (status, body) = h.call(Method::GET, "/users/me", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["fullName"], "Grace Hopper");
    assert_eq!(body["roles"], json!(["ROLE_USER"]));

    let (status, _) = h.call(Method::GET, "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_code_triggers_resend_and_never_enables() {
    let mut h = harness().await;

    h.call(Method::POST, "/auth/register", Some(registration("a@x.com")), None)
        .await;
    let first = h.outbox.recv().await.unwrap();

    sqlx::query("UPDATE activation_token SET expires_at = ?1")
        .bind(Utc::now() - Duration::seconds(1))
        .execute(&h.ctx.db)
        .await
        .unwrap();

    let (status, body) = h
        .call(
            Method::GET,
            &format!("/auth/activate-account?token={}", first.code),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "TokenExpired");

    let user = assert_ok!(h.ctx.accounts.find_by_email("a@x.com").await).unwrap();
    assert!(!user.enabled);

    let resent = h.outbox.recv().await.unwrap();
    let tokens = assert_ok!(h.ctx.accounts.tokens_for_user(user.id).await);
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[1].token, resent.code);
    assert_eq!(tokens[1].expires_at - tokens[1].created_at, Duration::minutes(20));

    let (status, _) = h
        .call(
            Method::GET,
            &format!("/auth/activate-account?token={}", resent.code),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let user = assert_ok!(h.ctx.accounts.find_by_id(user.id).await).unwrap();
    assert!(user.enabled);
}

#[tokio::test]
async fn duplicate_registration_leaves_single_user() {
    let mut h = harness().await;

    let (status, _) = h
        .call(Method::POST, "/auth/register", Some(registration("a@x.com")), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    h.outbox.recv().await.unwrap();

    let (status, body) = h
        .call(Method::POST, "/auth/register", Some(registration("a@x.com")), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DuplicateIdentity");

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&h.ctx.db)
        .await
        .unwrap();
    assert_eq!(users, 1);
    assert!(h.outbox.try_recv().is_err());
}

#[tokio::test]
async fn expired_bearer_token_is_rejected() {
    let mut h = harness().await;
    h.call(Method::POST, "/auth/register", Some(registration("a@x.com")), None)
        .await;
    let code = h.outbox.recv().await.unwrap().code;
    h.call(
        Method::GET,
        &format!("/auth/activate-account?token={}", code),
        None,
        None,
    )
    .await;

    let key = assert_ok!(bank_auth::jwt::SigningKey::from_base64(&config().authentication.jwt_secret));
    let (issuer, verifier) = bank_auth::jwt::key_pair(&key);
    let stale = assert_ok!(issuer.issue("a@x.com", serde_json::Map::new(), Duration::seconds(-5)));

    assert!(!verifier.verify(&stale, "a@x.com"));
    assert_err!(verifier.extract_subject(&stale));

    let (status, _) = h.call(Method::GET, "/users/me", None, Some(&stale)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
