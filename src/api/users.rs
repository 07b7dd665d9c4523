/// Endpoints for the authenticated caller
use crate::{
    account::UserProfile,
    api::middleware::require_bearer,
    auth::AuthContext,
    context::AppContext,
    db::UserRepository,
    error::{BankError, BankResult},
    rate_limit::authenticated_rate_limit,
};
use axum::{extract::State, middleware, routing::get, Json, Router};

/// Build bearer-protected routes
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    Router::new()
        .route("/users/me", get(me))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), require_bearer))
        .route_layer(middleware::from_fn_with_state(ctx, authenticated_rate_limit))
}

/// GET /users/me
async fn me(State(ctx): State<AppContext>, auth: AuthContext) -> BankResult<Json<UserProfile>> {
    let user = ctx
        .accounts
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| BankError::NotFound("User not found".to_string()))?;

    Ok(Json(UserProfile::from(&user)))
}
