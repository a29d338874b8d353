// src/state.rs
use crate::{config::AppConfig, services::audit_service::AuditSink};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_cookies::Key;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<AppConfig>,
    // signs the flash cookie
    pub cookie_key: Key,
    pub audit: Arc<dyn AuditSink>,
}

// Lets handlers extract the DB pool directly
impl axum::extract::FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.db_pool.clone()
    }
}
