//! Authorization gate for repository routes
//!
//! Turns the request's auth cookies into a GitHub bearer token usable for
//! upstream calls. The gate never touches the response: a reissued access
//! token is handed back in [`Authorization`] and the handler writes it.

use std::sync::Arc;

use axum_extra::extract::CookieJar;

use super::cookies::{ACCESS_COOKIE, CookiePolicy, REFRESH_COOKIE, cookie_value};
use super::locks::KeyedLocks;
use crate::data::User;
use crate::error::AppError;
use crate::service::AuthService;

/// Outcome of a successful pass through the gate
#[derive(Debug, Clone)]
pub struct Authorization {
    pub user_id: String,
    pub session_id: String,
    /// GitHub access token, valid at the time of return
    pub bearer: String,
    /// New access token to send back as the `jwt` cookie
    pub reissued_access_token: Option<String>,
}

impl Authorization {
    /// Write any reissued access token into the response jar
    pub fn apply_cookies(&self, jar: CookieJar, policy: &CookiePolicy) -> CookieJar {
        match &self.reissued_access_token {
            Some(token) => policy.set_access(jar, token.clone()),
            None => jar,
        }
    }
}

/// Per-request authorization check
pub struct AuthGate {
    auth: Arc<AuthService>,
    refresh_locks: KeyedLocks,
}

impl AuthGate {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self {
            auth,
            refresh_locks: KeyedLocks::new(),
        }
    }

    /// Authorize a request from its cookies
    ///
    /// # Steps
    /// 1. A valid `jwt` identifies the user directly
    /// 2. Otherwise a live session behind `refresh` yields a new access token
    /// 3. The user's stored GitHub token is returned, refreshed first if stale
    ///
    /// An invalid `jwt` next to a `refresh` cookie counts as absent.
    pub async fn authorize(&self, jar: &CookieJar) -> Result<Authorization, AppError> {
        let access = cookie_value(jar, ACCESS_COOKIE);
        let refresh = cookie_value(jar, REFRESH_COOKIE);

        let mut access_rejected = false;
        if let Some(token) = access {
            match self.auth.authenticate_access(token).await {
                Ok(claims) => {
                    let bearer = self.upstream_bearer(&claims.sub).await?;
                    return Ok(Authorization {
                        user_id: claims.sub,
                        session_id: claims.sid,
                        bearer,
                        reissued_access_token: None,
                    });
                }
                Err(AppError::InvalidToken) => access_rejected = true,
                Err(other) => return Err(other),
            }
        }

        let Some(secret) = refresh else {
            return Err(if access_rejected {
                AppError::InvalidToken
            } else {
                AppError::NoRefreshToken
            });
        };

        let reissued = self.auth.reissue(secret).await?;
        let bearer = self.upstream_bearer(&reissued.user_id).await?;

        Ok(Authorization {
            user_id: reissued.user_id,
            session_id: reissued.session_id,
            bearer,
            reissued_access_token: Some(reissued.access_token),
        })
    }

    /// Return a GitHub token for the user whose expiry is in the future
    async fn upstream_bearer(&self, user_id: &str) -> Result<String, AppError> {
        let user = self.load_user(user_id).await?;
        if user.access_token_expires_at > self.auth.clock().now() {
            return Ok(user.access_token);
        }

        let _guard = self.refresh_locks.lock(user_id).await;

        // Another request may have refreshed while we waited.
        let user = self.load_user(user_id).await?;
        let now = self.auth.clock().now();
        if user.access_token_expires_at > now {
            return Ok(user.access_token);
        }

        self.refresh_upstream(&user).await.map_err(|error| {
            tracing::warn!(user_id = %user.id, %error, "GitHub token refresh failed");
            AppError::TokenExpiredRefreshFailed
        })
    }

    async fn load_user(&self, user_id: &str) -> Result<User, AppError> {
        let user = self
            .auth
            .db()
            .find_user(user_id)
            .await?
            .ok_or(AppError::AccessTokenMissing)?;

        if user.access_token.is_empty() {
            return Err(AppError::AccessTokenMissing);
        }
        Ok(user)
    }

    async fn refresh_upstream(&self, user: &User) -> Result<String, AppError> {
        let now = self.auth.clock().now();

        let refresh_token = user.refresh_token.as_deref().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("no GitHub refresh token stored"))
        })?;
        if user
            .refresh_token_expires_at
            .is_some_and(|expires_at| expires_at <= now)
        {
            return Err(AppError::Internal(anyhow::anyhow!(
                "GitHub refresh token expired"
            )));
        }

        let grant = self.auth.github().refresh_user_token(refresh_token).await?;
        let now = self.auth.clock().now();
        let tokens = grant.into_upstream_tokens(now)?;

        self.auth
            .db()
            .update_user_tokens(&user.id, &tokens, now)
            .await?;
        tracing::info!(user_id = %user.id, "GitHub token refreshed");

        Ok(tokens.access_token)
    }
}
