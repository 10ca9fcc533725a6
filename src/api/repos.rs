//! Repository endpoints
//!
//! Routes here sit behind the auth gate and call GitHub with the user's
//! own token.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use axum_extra::extract::CookieJar;
use serde_json::json;

use crate::AppState;
use crate::error::AppError;

/// Create repository router
///
/// Routes:
/// - GET /repos/check-installation
pub fn repos_router() -> Router<AppState> {
    Router::new().route("/repos/check-installation", get(check_installation))
}

/// GET /repos/check-installation
///
/// Finds the installation of this GitHub App among those the user can
/// see. A reissued access token is written back even when the lookup
/// fails afterwards.
async fn check_installation(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let authz = state.gate.authorize(&jar).await?;
    let jar = authz.apply_cookies(jar, &state.cookies);

    let github = state.auth.github();
    let installations = match github.list_installations(&authz.bearer).await {
        Ok(installations) => installations,
        Err(error) => return Ok((jar, Err(error))),
    };

    let found = installations
        .iter()
        .find(|installation| installation.client_id.as_deref() == Some(github.client_id()));

    let result = match found {
        Some(installation) => {
            tracing::debug!(
                user_id = %authz.user_id,
                installation_id = installation.id,
                "Installation found"
            );
            Ok(Json(json!({ "installationId": installation.id })))
        }
        None => Err(AppError::InstallationNotFound),
    };

    Ok((jar, result))
}
