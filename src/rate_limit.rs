/// Request rate limiting for public and authenticated routes
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{BankError, BankResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    auth: Arc<DirectLimiter>,
    authenticated: Arc<DirectLimiter>,
}

fn non_zero(value: u32, fallback: NonZeroU32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(fallback)
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_quota = Quota::per_second(non_zero(config.auth_requests_per_second, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size / 5, NonZeroU32::MIN));

        let authenticated_quota =
            Quota::per_second(non_zero(config.authenticated_requests_per_second, NonZeroU32::MIN))
                .allow_burst(non_zero(config.burst_size, NonZeroU32::MIN));

        Self {
            enabled: config.enabled,
            auth: Arc::new(GovernorLimiter::direct(auth_quota)),
            authenticated: Arc::new(GovernorLimiter::direct(authenticated_quota)),
        }
    }

    /// Check the quota shared by the public /auth routes
    pub fn check_auth(&self) -> BankResult<()> {
        self.check(&self.auth)
    }

    /// Check the quota shared by bearer-protected routes
    pub fn check_authenticated(&self) -> BankResult<()> {
        self.check(&self.authenticated)
    }

    fn check(&self, limiter: &DirectLimiter) -> BankResult<()> {
        if !self.enabled {
            return Ok(());
        }
        limiter.check().map_err(|_| BankError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

/// Middleware for the public /auth routes
pub async fn auth_rate_limit(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, BankError> {
    ctx.rate_limiter.check_auth()?;
    Ok(next.run(request).await)
}

/// Middleware for bearer-protected routes
pub async fn authenticated_rate_limit(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, BankError> {
    ctx.rate_limiter.check_authenticated()?;
    Ok(next.run(request).await)
}
