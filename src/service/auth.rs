//! Auth service
//!
//! The sign-in, refresh, verify and logout flows. Handlers in
//! `auth::routes` only translate between HTTP and these methods; cookie
//! writing stays in the handlers so every flow here is a plain function
//! of its inputs, the stores and the clock.

use std::sync::Arc;

use chrono::Duration;

use crate::auth::cookies::REFRESH_TTL_SECONDS;
use crate::auth::github::GitHubClient;
use crate::auth::secret::{RefreshSecret, hash_refresh_secret};
use crate::auth::token::{Claims, TokenIssuer};
use crate::clock::Clock;
use crate::data::{Database, Identity, NewSession, UserProfile};
use crate::error::AppError;
use crate::metrics::AUTH_EVENTS_TOTAL;

/// Where a sign-in request came from
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of a completed GitHub sign-in
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: Identity,
    pub session_id: String,
    pub access_token: String,
    /// Plaintext for the `refresh` cookie; not stored anywhere
    pub refresh_secret: String,
}

/// A new access token minted from a live session
#[derive(Debug)]
pub struct Reissued {
    pub user_id: String,
    pub session_id: String,
    pub access_token: String,
}

/// Auth flows over the user and session stores
pub struct AuthService {
    db: Arc<Database>,
    tokens: Arc<TokenIssuer>,
    github: Arc<GitHubClient>,
    clock: Arc<dyn Clock>,
    strict_sessions: bool,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        tokens: Arc<TokenIssuer>,
        github: Arc<GitHubClient>,
        clock: Arc<dyn Clock>,
        strict_sessions: bool,
    ) -> Self {
        Self {
            db,
            tokens,
            github,
            clock,
            strict_sessions,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn github(&self) -> &GitHubClient {
        &self.github
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Complete a GitHub sign-in
    ///
    /// # Steps
    /// 1. Exchange the code for GitHub tokens
    /// 2. Fetch the GitHub profile
    /// 3. Update the user with this GitHub id, or create one
    /// 4. Mint a refresh secret and open a session for its hash
    /// 5. Issue an access token for the session
    ///
    /// Nothing is returned for cookies unless every step succeeded.
    pub async fn login(&self, code: &str, client: &ClientInfo) -> Result<LoginOutcome, AppError> {
        let result = self.login_inner(code, client).await;
        record_event("login", &result);
        result
    }

    async fn login_inner(&self, code: &str, client: &ClientInfo) -> Result<LoginOutcome, AppError> {
        if code.trim().is_empty() {
            return Err(AppError::InvalidAuthCode);
        }

        let grant = self.github.exchange_code(code).await?;
        let tokens = grant.into_upstream_tokens(self.clock.now())?;

        let github_user = self.github.fetch_profile(&tokens.access_token).await?;
        let profile = UserProfile {
            github_id: github_user.id,
            username: github_user.login,
            email: github_user.email,
            avatar_url: github_user.avatar_url,
        };

        let now = self.clock.now();
        let user = match self.db.find_user_by_github_id(profile.github_id).await? {
            Some(existing) => {
                let user = self
                    .db
                    .update_user_login(&existing.id, &profile, &tokens, now)
                    .await?;
                tracing::info!(user_id = %user.id, github_id = user.github_id, "User updated");
                user
            }
            None => {
                let user = self.db.insert_user(&profile, &tokens, now).await?;
                tracing::info!(user_id = %user.id, github_id = user.github_id, "User created");
                user
            }
        };

        let secret = RefreshSecret::generate();
        let session = self
            .db
            .open_session(
                &NewSession {
                    user_id: user.id.clone(),
                    refresh_hash: secret.hash,
                    expires_at: now + Duration::seconds(REFRESH_TTL_SECONDS),
                    ip_address: client.ip.clone(),
                    user_agent: client.user_agent.clone(),
                },
                now,
            )
            .await?;

        let access_token = self.tokens.issue(&session.id, &user.id, now)?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            "Session opened"
        );

        Ok(LoginOutcome {
            user: user.identity(),
            session_id: session.id,
            access_token,
            refresh_secret: secret.plaintext,
        })
    }

    /// Verify an access token
    ///
    /// With strict sessions enabled the token's session must also still
    /// exist; a logged-out session invalidates its tokens immediately.
    pub async fn authenticate_access(&self, token: &str) -> Result<Claims, AppError> {
        let now = self.clock.now();
        let claims = self.tokens.verify(token, now)?;

        if self.strict_sessions && self.db.find_session(&claims.sid, now).await?.is_none() {
            tracing::debug!(sid = %claims.sid, "Access token outlived its session");
            return Err(AppError::InvalidToken);
        }

        Ok(claims)
    }

    /// `GET /auth/verify`
    pub async fn verify(&self, token: Option<&str>) -> Result<String, AppError> {
        let token = token.ok_or(AppError::NoToken)?;
        let claims = self.authenticate_access(token).await?;
        Ok(claims.sub)
    }

    /// `POST /auth/refresh`
    ///
    /// The refresh secret is not rotated.
    pub async fn refresh(&self, refresh_secret: Option<&str>) -> Result<Reissued, AppError> {
        let result = match refresh_secret {
            Some(secret) => self.reissue(secret).await,
            None => Err(AppError::NoRefreshToken),
        };
        record_event("refresh", &result);
        result
    }

    /// Mint a new access token from a refresh secret
    ///
    /// # Errors
    /// `NoActiveSession` when the secret matches no live session.
    pub async fn reissue(&self, refresh_secret: &str) -> Result<Reissued, AppError> {
        let now = self.clock.now();
        let refresh_hash = hash_refresh_secret(refresh_secret);

        let session = self
            .db
            .find_session_by_refresh_hash(&refresh_hash, now)
            .await?
            .ok_or(AppError::NoActiveSession)?;

        let access_token = self.tokens.issue(&session.id, &session.user_id, now)?;
        tracing::debug!(
            user_id = %session.user_id,
            session_id = %session.id,
            "Access token reissued"
        );

        Ok(Reissued {
            user_id: session.user_id,
            session_id: session.id,
            access_token,
        })
    }

    /// `POST /auth/fetch-user`
    pub async fn fetch_user(&self, user_id: &str) -> Result<Identity, AppError> {
        let user = self
            .db
            .find_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        Ok(user.identity())
    }

    /// `POST /auth/logout`
    ///
    /// Best effort: a store failure is logged and otherwise ignored.
    pub async fn logout(&self, refresh_secret: Option<&str>) {
        let Some(secret) = refresh_secret else {
            AUTH_EVENTS_TOTAL.with_label_values(&["logout", "noop"]).inc();
            return;
        };

        let refresh_hash = hash_refresh_secret(secret);
        match self.db.delete_session_by_refresh_hash(&refresh_hash).await {
            Ok(()) => {
                AUTH_EVENTS_TOTAL.with_label_values(&["logout", "ok"]).inc();
                tracing::info!("Session closed");
            }
            Err(error) => {
                AUTH_EVENTS_TOTAL
                    .with_label_values(&["logout", "error"])
                    .inc();
                tracing::error!(%error, "Failed to delete session on logout");
            }
        }
    }
}

fn record_event<T>(event: &str, result: &Result<T, AppError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(error) => error.code(),
    };
    AUTH_EVENTS_TOTAL.with_label_values(&[event, outcome]).inc();
}
