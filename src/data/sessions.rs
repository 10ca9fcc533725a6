//! Session store
//!
//! Rows in `active_sessions` are looked up by the SHA-256 of the refresh
//! secret. Expired rows are filtered on read; [`Database::delete_expired_sessions`]
//! removes them for good.

use chrono::{DateTime, Utc};

use super::Database;
use super::models::{EntityId, NewSession, Session};
use crate::error::AppError;

/// True when `hash` looks like a lowercase hex SHA-256 digest
pub fn is_refresh_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl Database {
    /// Open a session
    ///
    /// # Errors
    /// Fails with a store error when `refresh_hash` is already taken or
    /// `user_id` does not exist.
    pub async fn open_session(
        &self,
        new: &NewSession,
        now: DateTime<Utc>,
    ) -> Result<Session, AppError> {
        if !is_refresh_hash(&new.refresh_hash) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "refresh hash must be 64 lowercase hex characters"
            )));
        }

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO active_sessions (
                id, user_id, refresh_hash, expires_at, created_at, ip_address, user_agent
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(EntityId::new().0)
        .bind(&new.user_id)
        .bind(&new.refresh_hash)
        .bind(new.expires_at)
        .bind(now)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    /// Find a live session by refresh hash
    pub async fn find_session_by_refresh_hash(
        &self,
        refresh_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AppError> {
        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM active_sessions WHERE refresh_hash = ?")
                .bind(refresh_hash)
                .fetch_optional(&self.pool)
                .await?;

        Ok(session.filter(|session| session.is_alive_at(now)))
    }

    /// Find a live session by id
    pub async fn find_session(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM active_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session.filter(|session| session.is_alive_at(now)))
    }

    /// Delete the session for a refresh hash
    ///
    /// Deleting a hash that has no row is not an error.
    pub async fn delete_session_by_refresh_hash(&self, refresh_hash: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM active_sessions WHERE refresh_hash = ?")
            .bind(refresh_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every session whose `expires_at` is not after `now`
    ///
    /// # Returns
    /// Number of rows removed
    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM active_sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count all session rows, live or not
    pub async fn count_sessions(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM active_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count session rows (live or not) belonging to a user
    pub async fn count_sessions_for_user(&self, user_id: &str) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM active_sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
