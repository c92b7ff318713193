//! User and session database operations

use chrono::Utc;
use medley_common::db::models::{Session, User};
use medley_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_guid, parse_timestamp};

/// Save user to database
pub async fn save_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (guid, name, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            password_hash = excluded.password_hash,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user.guid.to_string())
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.created_at.to_rfc3339())
    .bind(user.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load user by email
pub async fn load_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT guid, name, email, password_hash, created_at, updated_at
         FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let guid: String = row.get("guid");
            let created_at: String = row.get("created_at");
            let updated_at: String = row.get("updated_at");
            Ok(Some(User {
                guid: parse_guid(&guid)?,
                name: row.get("name"),
                email: row.get("email"),
                password_hash: row.get("password_hash"),
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Create a session row
pub async fn save_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&session.token)
    .bind(session.user_id.to_string())
    .bind(session.expires_at.to_rfc3339())
    .bind(session.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Resolve a session token to its owning user id, ignoring expired sessions
pub async fn load_session_user(pool: &SqlitePool, token: &str) -> Result<Option<Uuid>> {
    let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let expires_at: String = row.get("expires_at");
            if parse_timestamp(&expires_at)? <= Utc::now() {
                return Ok(None);
            }
            let user_id: String = row.get("user_id");
            Ok(Some(parse_guid(&user_id)?))
        }
        None => Ok(None),
    }
}

/// Delete a session (logout)
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use medley_common::db::init::init_memory_database;

    fn test_user() -> User {
        let now = Utc::now();
        User {
            guid: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "hash".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_user() {
        let pool = init_memory_database().await.unwrap();
        let user = test_user();
        save_user(&pool, &user).await.unwrap();

        let loaded = load_user_by_email(&pool, "test@example.com")
            .await
            .unwrap()
            .expect("user not found");
        assert_eq!(loaded.guid, user.guid);
        assert_eq!(loaded.name, "Test");
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let pool = init_memory_database().await.unwrap();
        let user = test_user();
        save_user(&pool, &user).await.unwrap();

        let session = Session {
            token: "expired-token".to_string(),
            user_id: user.guid,
            expires_at: Utc::now() - Duration::hours(1),
            created_at: Utc::now() - Duration::days(8),
        };
        save_session(&pool, &session).await.unwrap();

        assert!(load_session_user(&pool, "expired-token").await.unwrap().is_none());

        let live = Session {
            token: "live-token".to_string(),
            user_id: user.guid,
            expires_at: Utc::now() + Duration::hours(1),
            created_at: Utc::now(),
        };
        save_session(&pool, &live).await.unwrap();

        assert_eq!(
            load_session_user(&pool, "live-token").await.unwrap(),
            Some(user.guid)
        );
    }
}
