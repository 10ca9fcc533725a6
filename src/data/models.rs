//! Data models
//!
//! Rust structs representing database rows.
//! IDs are UUID v4 strings; timestamps are chrono UTC instants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (UUID v4, hyphenated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new random id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// A person who signed in with GitHub
///
/// Holds the GitHub-issued tokens used for upstream calls. These never
/// leave the server; clients only ever see an [`Identity`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub github_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    /// GitHub user access token
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    /// GitHub refresh token, absent when the GitHub App does not expire tokens
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Public projection returned to clients
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            github_id: self.github_id,
            username: self.username.clone(),
            email: self.email.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Identity bundle returned to clients; never includes tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub github_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Profile fields copied from GitHub on every login
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub github_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// GitHub token pair with absolute expiry instants
#[derive(Debug, Clone)]
pub struct UpstreamTokens {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    /// `None` keeps whatever refresh token is already stored
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Session
// =============================================================================

/// Server-side record backing one `refresh` cookie
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    /// Lowercase hex SHA-256 of the refresh secret
    pub refresh_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    /// A session is alive while `expires_at` is in the future
    pub fn is_alive_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Input for opening a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub refresh_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
