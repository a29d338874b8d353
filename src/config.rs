// src/config.rs
use crate::error::{AppError, AppResult};
use std::{env, net::SocketAddr, path::PathBuf};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_SESSION_IDLE_MINUTES: i64 = 30;
pub const DEFAULT_AUDIT_LOG_PATH: &str = "logs/security.log";
pub const DEFAULT_GUEST_DAILY_LIMIT: i64 = 3;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
// the cookie signing key needs 64 bytes
pub const MIN_SESSION_SECRET_LEN: usize = 64;

/// Runtime configuration, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub bind_addr: SocketAddr,
    pub session_idle_minutes: i64,
    pub audit_log_path: PathBuf,
    pub guest_daily_limit: i64,
    pub retention_days: i64,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;
        let session_secret = env::var("SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(AppError::Config(format!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            )));
        }

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR: {}", e)))?;

        Ok(Self {
            database_url,
            session_secret,
            bind_addr,
            session_idle_minutes: int_var("SESSION_IDLE_MINUTES", DEFAULT_SESSION_IDLE_MINUTES)?,
            audit_log_path: env::var("AUDIT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_AUDIT_LOG_PATH)),
            guest_daily_limit: int_var("GUEST_DAILY_LIMIT", DEFAULT_GUEST_DAILY_LIMIT)?,
            retention_days: int_var("MAINTENANCE_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
        })
    }

    /// Audit log location without touching the rest of the environment.
    /// Logging is set up before the full config is validated.
    pub fn audit_log_path_from_env() -> PathBuf {
        dotenvy::dotenv().ok();
        env::var("AUDIT_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_AUDIT_LOG_PATH))
    }
}

fn int_var(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(raw) => parse_positive(name, &raw),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e.into()),
    }
}

fn parse_positive(name: &str, raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(AppError::Config(format!("{} must be a positive integer, got '{}'", name, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_integers_are_accepted() {
        assert_eq!(parse_positive("X", " 45 ").unwrap(), 45);
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert!(matches!(parse_positive("X", "0"), Err(AppError::Config(_))));
        assert!(matches!(parse_positive("X", "thirty"), Err(AppError::Config(_))));
    }
}
