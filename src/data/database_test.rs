//! Database tests

use super::*;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_url = format!("sqlite:{}", temp_dir.path().join("test.db").display());
    let db = Database::connect(&db_url).await.unwrap();
    (db, temp_dir)
}

fn profile(github_id: i64, username: &str) -> UserProfile {
    UserProfile {
        github_id,
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        avatar_url: Some("https://avatars.example.com/u".to_string()),
    }
}

fn tokens(access: &str, refresh: Option<&str>) -> UpstreamTokens {
    let now = Utc::now();
    UpstreamTokens {
        access_token: access.to_string(),
        access_token_expires_at: now + Duration::hours(8),
        refresh_token: refresh.map(ToString::to_string),
        refresh_token_expires_at: refresh.map(|_| now + Duration::days(180)),
    }
}

fn hash_of(byte: char) -> String {
    std::iter::repeat(byte).take(64).collect()
}

async fn create_user(db: &Database) -> User {
    db.insert_user(&profile(42, "alice"), &tokens("ghA", Some("ghR")), Utc::now())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
}

#[tokio::test]
async fn test_user_insert_and_lookup() {
    let (db, _temp_dir) = create_test_db().await;

    let user = create_user(&db).await;
    assert_eq!(user.github_id, 42);
    assert_eq!(user.refresh_token.as_deref(), Some("ghR"));

    let by_github = db.find_user_by_github_id(42).await.unwrap().unwrap();
    assert_eq!(by_github.id, user.id);

    let by_id = db.find_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, "alice");

    assert!(db.find_user("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_same_github_id_keeps_one_row() {
    let (db, _temp_dir) = create_test_db().await;

    let first = create_user(&db).await;
    let second = db
        .insert_user(&profile(42, "alice-renamed"), &tokens("ghA2", None), Utc::now())
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.username, "alice-renamed");
    assert_eq!(second.refresh_token.as_deref(), Some("ghR"));
    assert_eq!(db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_user_tokens_keeps_refresh_when_absent() {
    let (db, _temp_dir) = create_test_db().await;
    let user = create_user(&db).await;

    db.update_user_tokens(&user.id, &tokens("ghA-new", None), Utc::now())
        .await
        .unwrap();

    let updated = db.find_user(&user.id).await.unwrap().unwrap();
    assert_eq!(updated.access_token, "ghA-new");
    assert_eq!(updated.refresh_token.as_deref(), Some("ghR"));

    db.update_user_tokens(&user.id, &tokens("ghA-3", Some("ghR-3")), Utc::now())
        .await
        .unwrap();
    let updated = db.find_user(&user.id).await.unwrap().unwrap();
    assert_eq!(updated.refresh_token.as_deref(), Some("ghR-3"));
}

#[tokio::test]
async fn test_update_user_tokens_for_missing_user_fails() {
    let (db, _temp_dir) = create_test_db().await;

    let result = db
        .update_user_tokens("missing", &tokens("ghA", None), Utc::now())
        .await;
    assert!(matches!(result, Err(crate::error::AppError::Store(_))));
}

#[tokio::test]
async fn test_session_open_find_delete() {
    let (db, _temp_dir) = create_test_db().await;
    let user = create_user(&db).await;
    let now = Utc::now();

    let session = db
        .open_session(
            &NewSession {
                user_id: user.id.clone(),
                refresh_hash: hash_of('a'),
                expires_at: now + Duration::days(90),
                ip_address: Some("127.0.0.1".to_string()),
                user_agent: Some("test-agent".to_string()),
            },
            now,
        )
        .await
        .unwrap();

    let found = db
        .find_session_by_refresh_hash(&hash_of('a'), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, session.id);
    assert_eq!(found.user_id, user.id);
    assert!(db.find_session(&session.id, now).await.unwrap().is_some());

    db.delete_session_by_refresh_hash(&hash_of('a')).await.unwrap();
    assert!(
        db.find_session_by_refresh_hash(&hash_of('a'), now)
            .await
            .unwrap()
            .is_none()
    );

    // Deleting again is a no-op
    db.delete_session_by_refresh_hash(&hash_of('a')).await.unwrap();
    assert_eq!(db.count_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_expired_session_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;
    let user = create_user(&db).await;
    let now = Utc::now();

    let session = db
        .open_session(
            &NewSession {
                user_id: user.id.clone(),
                refresh_hash: hash_of('b'),
                expires_at: now + Duration::seconds(10),
                ip_address: None,
                user_agent: None,
            },
            now,
        )
        .await
        .unwrap();

    let later = now + Duration::seconds(10);
    assert!(
        db.find_session_by_refresh_hash(&hash_of('b'), later)
            .await
            .unwrap()
            .is_none()
    );
    assert!(db.find_session(&session.id, later).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_refresh_hash_is_a_store_error() {
    let (db, _temp_dir) = create_test_db().await;
    let user = create_user(&db).await;
    let now = Utc::now();
    let new = NewSession {
        user_id: user.id.clone(),
        refresh_hash: hash_of('c'),
        expires_at: now + Duration::days(90),
        ip_address: None,
        user_agent: None,
    };

    db.open_session(&new, now).await.unwrap();
    let result = db.open_session(&new, now).await;

    assert!(matches!(result, Err(crate::error::AppError::Store(_))));
    assert_eq!(db.count_sessions().await.unwrap(), 1);
}

#[tokio::test]
async fn test_session_requires_existing_user() {
    let (db, _temp_dir) = create_test_db().await;
    let now = Utc::now();

    let result = db
        .open_session(
            &NewSession {
                user_id: "no-such-user".to_string(),
                refresh_hash: hash_of('d'),
                expires_at: now + Duration::days(90),
                ip_address: None,
                user_agent: None,
            },
            now,
        )
        .await;

    assert!(matches!(result, Err(crate::error::AppError::Store(_))));
}

#[tokio::test]
async fn test_open_session_rejects_non_hex_hash() {
    let (db, _temp_dir) = create_test_db().await;
    let user = create_user(&db).await;
    let now = Utc::now();

    let result = db
        .open_session(
            &NewSession {
                user_id: user.id,
                refresh_hash: "not-a-digest".to_string(),
                expires_at: now + Duration::days(90),
                ip_address: None,
                user_agent: None,
            },
            now,
        )
        .await;

    assert!(result.is_err());
    assert_eq!(db.count_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_expired_sessions() {
    let (db, _temp_dir) = create_test_db().await;
    let user = create_user(&db).await;
    let now = Utc::now();

    for (byte, ttl) in [('1', -60), ('2', 0), ('3', 3600)] {
        db.open_session(
            &NewSession {
                user_id: user.id.clone(),
                refresh_hash: hash_of(byte),
                expires_at: now + Duration::seconds(ttl),
                ip_address: None,
                user_agent: None,
            },
            now - Duration::hours(1),
        )
        .await
        .unwrap();
    }

    let removed = db.delete_expired_sessions(now).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(db.count_sessions_for_user(&user.id).await.unwrap(), 1);
    assert!(
        db.find_session_by_refresh_hash(&hash_of('3'), now)
            .await
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_is_refresh_hash() {
    assert!(is_refresh_hash(&hash_of('f')));
    assert!(!is_refresh_hash(&hash_of('F')));
    assert!(!is_refresh_hash("abc"));
    assert!(!is_refresh_hash(&hash_of('g')));
}
