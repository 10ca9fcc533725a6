//! GitHub OAuth client
//!
//! Talks to the GitHub token endpoint (`/login/oauth/access_token`) and
//! the REST API (`/user`, `/user/installations`). Every request carries
//! the configured timeout; a timeout is reported as `UpstreamUnavailable`.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::data::UpstreamTokens;
use crate::error::AppError;
use crate::metrics::GITHUB_REQUESTS_TOTAL;

/// Lifetime assumed for a GitHub token issued without `expires_in`
///
/// GitHub omits `expires_in` when the app has token expiration turned
/// off. Such tokens are re-checked yearly.
const NON_EXPIRING_TOKEN_TTL_DAYS: i64 = 365;

/// Tokens returned by the GitHub token endpoint
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Seconds until the access token expires
    pub access_expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    /// Seconds until the refresh token expires
    pub refresh_expires_in: Option<i64>,
}

impl TokenGrant {
    /// Resolve relative lifetimes into absolute instants
    ///
    /// # Errors
    /// `UpstreamUnavailable` when a lifetime is not positive or does not fit
    /// in a timestamp
    pub fn into_upstream_tokens(self, now: DateTime<Utc>) -> Result<UpstreamTokens, AppError> {
        let access_token_expires_at = expires_at(now, self.access_expires_in, "expires_in")?;
        let refresh_token_expires_at = match self.refresh_token {
            Some(_) => Some(expires_at(
                now,
                self.refresh_expires_in,
                "refresh_token_expires_in",
            )?),
            None => None,
        };

        Ok(UpstreamTokens {
            access_token: self.access_token,
            access_token_expires_at,
            refresh_token: self.refresh_token,
            refresh_token_expires_at,
        })
    }
}

fn expires_at(
    now: DateTime<Utc>,
    expires_in: Option<i64>,
    field: &str,
) -> Result<DateTime<Utc>, AppError> {
    let lifetime = match expires_in {
        Some(seconds) if seconds > 0 => Duration::try_seconds(seconds),
        Some(_) => None,
        None => Duration::try_days(NON_EXPIRING_TOKEN_TTL_DAYS),
    };

    lifetime
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::UpstreamUnavailable(format!(
                "GitHub returned an unusable {field}: {expires_in:?}"
            ))
        })
}

/// GitHub user profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubProfile {
    pub id: i64,
    pub login: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// A GitHub App installation visible to the user
#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    pub id: i64,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    refresh_token_expires_in: Option<i64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: Option<i64>,
    login: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstallationsResponse {
    #[serde(default)]
    installations: Vec<Installation>,
}

/// Client for the GitHub OAuth and user endpoints
pub struct GitHubClient {
    http: reqwest::Client,
    oauth_base_url: String,
    api_base_url: String,
    client_id: String,
    client_secret: String,
}

impl GitHubClient {
    /// Build a client from configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("CodeIQ/", env!("CARGO_PKG_VERSION")))
            .timeout(config.github_timeout())
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            oauth_base_url: config.github_oauth_url.trim_end_matches('/').to_string(),
            api_base_url: config.github_api_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchange an authorization code for user tokens
    ///
    /// # Errors
    /// - `UpstreamUnavailable` on transport failure, timeout or non-2xx
    /// - `InvalidAuthCode` when the response has no `access_token`
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ];
        let response = self.post_token_form(&form, "exchange_code").await?;

        let access_token = response.access_token.ok_or_else(|| {
            tracing::warn!(
                github_error = response.error.as_deref().unwrap_or("none"),
                "GitHub rejected authorization code"
            );
            AppError::InvalidAuthCode
        })?;

        Ok(TokenGrant {
            access_token,
            access_expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            refresh_expires_in: response.refresh_token_expires_in,
        })
    }

    /// Trade a GitHub refresh token for a new access token
    ///
    /// The response may omit `refresh_token`; callers keep the old one then.
    pub async fn refresh_user_token(&self, refresh_token: &str) -> Result<TokenGrant, AppError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = self.post_token_form(&form, "refresh_token").await?;

        let access_token = response.access_token.ok_or_else(|| {
            AppError::UpstreamUnavailable(format!(
                "refresh response without access_token ({})",
                response.error.as_deref().unwrap_or("no error given")
            ))
        })?;

        Ok(TokenGrant {
            access_token,
            access_expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            refresh_expires_in: response.refresh_token_expires_in,
        })
    }

    /// Fetch the signed-in user's profile
    ///
    /// # Errors
    /// - `UpstreamUnavailable` on transport failure or non-2xx
    /// - `InvalidUserData` when the profile has no `id` or `login`
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GitHubProfile, AppError> {
        let url = format!("{}/user", self.api_base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        record_request("user", status);
        if !status.is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "GitHub user fetch returned {status}"
            )));
        }

        let profile: ProfileResponse = response.json().await?;
        match (profile.id, profile.login) {
            (Some(id), Some(login)) => Ok(GitHubProfile {
                id,
                login,
                email: profile.email,
                avatar_url: profile.avatar_url,
            }),
            _ => Err(AppError::InvalidUserData),
        }
    }

    /// List GitHub App installations accessible with the user's token
    pub async fn list_installations(
        &self,
        access_token: &str,
    ) -> Result<Vec<Installation>, AppError> {
        let url = format!("{}/user/installations", self.api_base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        record_request("installations", status);
        if !status.is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "GitHub installations fetch returned {status}"
            )));
        }

        let body: InstallationsResponse = response.json().await?;
        Ok(body.installations)
    }

    async fn post_token_form(
        &self,
        form: &[(&str, &str)],
        endpoint: &'static str,
    ) -> Result<TokenResponse, AppError> {
        let url = format!("{}/login/oauth/access_token", self.oauth_base_url);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        record_request(endpoint, status);
        if !status.is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "GitHub token endpoint returned {status}"
            )));
        }

        Ok(response.json().await?)
    }
}

fn record_request(endpoint: &str, status: reqwest::StatusCode) {
    GITHUB_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
}
