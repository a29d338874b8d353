// src/web/mod.rs
pub mod auth_handlers;
pub mod client_ip;
pub mod csrf;
pub mod dashboard_handlers;
pub mod declaration_handlers;
pub mod flash;
pub mod mw_auth;
pub mod profile_handlers;
pub mod record_handlers;
pub mod routes;

use crate::error::{AppError, AppResult};
use askama::Template;
use axum::response::Html;
use serde::Deserialize;

pub(crate) fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::SessionError(e.to_string())
}

pub(crate) fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    template.render().map(Html).map_err(|e| {
        tracing::error!("Template render failed: {}", e);
        AppError::InternalServerError
    })
}

/// Post/Redirect/Get feedback carried in the query string (`?success=` / `?error=`).
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackParams {
    pub success: Option<String>,
    pub error: Option<String>,
}

pub(crate) fn redirect_with(path: &str, kind: &str, message: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", path, separator, kind, urlencoding::encode(message))
}

/// Body of forms that only carry the CSRF token (logout, delete, export).
#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}
