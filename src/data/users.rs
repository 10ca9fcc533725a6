//! User store

use chrono::{DateTime, Utc};

use super::Database;
use super::models::{EntityId, UpstreamTokens, User, UserProfile};
use crate::error::AppError;

impl Database {
    /// Get user by id
    pub async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Get user by GitHub numeric id
    pub async fn find_user_by_github_id(&self, github_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE github_id = ?")
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Insert a user on first sign-in
    ///
    /// If a concurrent sign-in for the same GitHub id won the race, that row
    /// is updated instead so exactly one row per GitHub id survives.
    pub async fn insert_user(
        &self,
        profile: &UserProfile,
        tokens: &UpstreamTokens,
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, github_id, username, email, avatar_url,
                access_token, access_token_expires_at,
                refresh_token, refresh_token_expires_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(github_id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                avatar_url = excluded.avatar_url,
                access_token = excluded.access_token,
                access_token_expires_at = excluded.access_token_expires_at,
                refresh_token = COALESCE(excluded.refresh_token, users.refresh_token),
                refresh_token_expires_at = COALESCE(excluded.refresh_token_expires_at, users.refresh_token_expires_at),
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(EntityId::new().0)
        .bind(profile.github_id)
        .bind(&profile.username)
        .bind(&profile.email)
        .bind(&profile.avatar_url)
        .bind(&tokens.access_token)
        .bind(tokens.access_token_expires_at)
        .bind(&tokens.refresh_token)
        .bind(tokens.refresh_token_expires_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Rewrite profile and tokens after a repeat sign-in
    pub async fn update_user_login(
        &self,
        id: &str,
        profile: &UserProfile,
        tokens: &UpstreamTokens,
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                github_id = ?,
                username = ?,
                email = ?,
                avatar_url = ?,
                access_token = ?,
                access_token_expires_at = ?,
                refresh_token = COALESCE(?, refresh_token),
                refresh_token_expires_at = COALESCE(?, refresh_token_expires_at),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(profile.github_id)
        .bind(&profile.username)
        .bind(&profile.email)
        .bind(&profile.avatar_url)
        .bind(&tokens.access_token)
        .bind(tokens.access_token_expires_at)
        .bind(&tokens.refresh_token)
        .bind(tokens.refresh_token_expires_at)
        .bind(now)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Store refreshed GitHub tokens
    ///
    /// A `None` refresh token keeps the stored one.
    pub async fn update_user_tokens(
        &self,
        id: &str,
        tokens: &UpstreamTokens,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                access_token = ?,
                access_token_expires_at = ?,
                refresh_token = COALESCE(?, refresh_token),
                refresh_token_expires_at = COALESCE(?, refresh_token_expires_at),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&tokens.access_token)
        .bind(tokens.access_token_expires_at)
        .bind(&tokens.refresh_token)
        .bind(tokens.refresh_token_expires_at)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Store(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    /// Count all users
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
