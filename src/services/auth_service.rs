// src/services/auth_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::User,
    services::user_service,
};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

pub const MAX_LOGIN_ATTEMPTS: usize = 5;
pub const LOGIN_WINDOW_SECS: i64 = 15 * 60;

/// Checks whether the given password matches the stored hash.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Verifying bcrypt hash...");
        bcrypt::verify(&password, &stored_hash)
    })
    .await
    .map_err(|e| {
        tracing::error!("spawn_blocking task failed (verify_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("bcrypt error while verifying password: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Produces a bcrypt hash for a password.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Generating bcrypt hash...");
        bcrypt::hash(&password, bcrypt::DEFAULT_COST)
    })
    .await
    .map_err(|e| {
        tracing::error!("spawn_blocking task failed (hash_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("bcrypt error while hashing password: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Looks the account up by username or email and checks the password.
/// Unknown account and wrong password both come back as `InvalidCredentials`.
pub async fn authenticate(db_pool: &SqlitePool, login: &str, password: &str) -> AppResult<User> {
    let user = user_service::find_user_by_login(db_pool, login.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if verify_password(password, &user.password_hash).await? {
        Ok(user)
    } else {
        Err(AppError::InvalidCredentials)
    }
}

/// Sliding-window attempt log kept in the session. Every attempt counts,
/// successful or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub attempts: Vec<NaiveDateTime>,
}

impl RateLimit {
    /// Drops attempts older than the window, then records `now` if there is room.
    /// Returns `false` when the limit is already reached.
    pub fn try_acquire(&mut self, now: NaiveDateTime, max_attempts: usize, window: Duration) -> bool {
        self.attempts.retain(|ts| now - *ts < window);
        if self.attempts.len() >= max_attempts {
            return false;
        }
        self.attempts.push(now);
        true
    }

    pub fn try_acquire_login(&mut self, now: NaiveDateTime) -> bool {
        self.try_acquire(now, MAX_LOGIN_ATTEMPTS, Duration::seconds(LOGIN_WINDOW_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn sixth_attempt_in_window_is_refused() {
        let mut limit = RateLimit::default();
        for m in 0..5 {
            assert!(limit.try_acquire_login(at(9, m)));
        }
        assert!(!limit.try_acquire_login(at(9, 10)));
        assert_eq!(limit.attempts.len(), 5);
    }

    #[test]
    fn old_attempts_expire() {
        let mut limit = RateLimit::default();
        for m in 0..5 {
            assert!(limit.try_acquire_login(at(9, m)));
        }
        // 09:00 is exactly 15 minutes old at 09:15 and drops out
        assert!(limit.try_acquire_login(at(9, 15)));
        assert!(!limit.try_acquire_login(at(9, 15)));
    }

    #[tokio::test]
    async fn authenticate_by_username_or_email() {
        let pool = test_pool().await;
        user_service::create_user(&pool, "nurse01", "nurse@clinic.ph", "secret99").await.unwrap();

        let by_name = authenticate(&pool, "nurse01", "secret99").await.unwrap();
        let by_email = authenticate(&pool, " nurse@clinic.ph ", "secret99").await.unwrap();
        assert_eq!(by_name.id, by_email.id);

        assert!(matches!(authenticate(&pool, "nurse01", "wrong").await, Err(AppError::InvalidCredentials)));
        assert!(matches!(authenticate(&pool, "ghost", "secret99").await, Err(AppError::InvalidCredentials)));
    }
}
