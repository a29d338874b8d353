// src/services/user_service.rs
use crate::{
    error::AppResult,
    models::user::User,
    services::auth_service,
};
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

/// Finds an account by its ID.
pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by ID: {}", user_id);
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

/// Finds an account by username or email, whichever matches.
pub async fn find_user_by_login(db_pool: &SqlitePool, login: &str) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by login: {}", login);
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?1 OR email = ?1 LIMIT 1",
        USER_COLUMNS
    ))
    .bind(login)
    .fetch_optional(db_pool)
    .await?;
    Ok(user)
}

pub async fn username_taken(db_pool: &SqlitePool, username: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(db_pool)
        .await?;
    Ok(count > 0)
}

pub async fn email_taken(db_pool: &SqlitePool, email: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(db_pool)
        .await?;
    Ok(count > 0)
}

/// Creates an account and returns its ID. Uniqueness is checked by the caller;
/// the UNIQUE constraints still reject a race.
pub async fn create_user(db_pool: &SqlitePool, username: &str, email: &str, raw_password: &str) -> AppResult<i64> {
    tracing::info!("Creating user: {}", username);
    let password_hash = auth_service::hash_password(raw_password).await?;

    let id = sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .execute(db_pool)
        .await?
        .last_insert_rowid();

    tracing::info!("✅ User '{}' created with ID {}", username, id);
    Ok(id)
}
