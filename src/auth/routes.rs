//! Auth endpoints
//!
//! Routes:
//! - POST /auth/callback   - complete GitHub sign-in, set both cookies
//! - GET  /auth/verify     - check the access token
//! - POST /auth/refresh    - mint a new access token from the refresh cookie
//! - POST /auth/fetch-user - public identity of a user
//! - POST /auth/logout     - close the session, clear both cookies

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;

use super::cookies::{ACCESS_COOKIE, REFRESH_COOKIE, cookie_value};
use super::middleware::{Client, limit_auth_requests};
use crate::AppState;
use crate::error::AppError;

/// Create authentication router
///
/// `/auth/callback` and `/auth/refresh` are rate limited per client IP.
pub fn auth_router(state: AppState) -> Router<AppState> {
    let limited = Router::new()
        .route("/auth/callback", post(callback))
        .route("/auth/refresh", post(refresh))
        .route_layer(middleware::from_fn_with_state(state, limit_auth_requests));

    Router::new()
        .route("/auth/verify", get(verify))
        .route("/auth/fetch-user", post(fetch_user))
        .route("/auth/logout", post(logout))
        .merge(limited)
}

#[derive(Debug, Deserialize)]
struct CallbackRequest {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchUserRequest {
    user_id: Option<String>,
}

/// POST /auth/callback
///
/// A missing or unreadable body is treated as a missing code.
async fn callback(
    State(state): State<AppState>,
    Client(client): Client,
    jar: CookieJar,
    body: Option<Json<CallbackRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let code = body
        .and_then(|Json(body)| body.code)
        .ok_or(AppError::InvalidAuthCode)?;

    let outcome = state.auth.login(&code, &client).await?;
    let jar = state
        .cookies
        .set_all(jar, outcome.access_token, outcome.refresh_secret);

    Ok((jar, Json(json!({ "user": outcome.user }))))
}

/// GET /auth/verify
async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.auth.verify(cookie_value(&jar, ACCESS_COOKIE)).await?;
    Ok(Json(json!({ "userId": user_id })))
}

/// POST /auth/refresh
///
/// Only the `jwt` cookie is rewritten; the refresh cookie stays as is.
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let reissued = state
        .auth
        .refresh(cookie_value(&jar, REFRESH_COOKIE))
        .await?;
    let jar = state.cookies.set_access(jar, reissued.access_token);

    Ok((jar, Json(json!({ "userId": reissued.user_id }))))
}

/// POST /auth/fetch-user
async fn fetch_user(
    State(state): State<AppState>,
    body: Option<Json<FetchUserRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = body
        .and_then(|Json(body)| body.user_id)
        .ok_or(AppError::UserNotFound)?;

    let user = state.auth.fetch_user(&user_id).await?;
    Ok(Json(json!({ "user": user })))
}

/// POST /auth/logout
///
/// Always 200 with both cookies cleared, whatever the store says.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    state.auth.logout(cookie_value(&jar, REFRESH_COOKIE)).await;
    let jar = state.cookies.clear_all(jar);

    (jar, Json(json!({})))
}
