// src/web/csrf.rs
use crate::{
    error::{AppError, AppResult},
    services::audit_service::{AuditSink, Severity},
    web::session_error,
};
use tower_sessions::Session;
use uuid::Uuid;

pub const CSRF_SESSION_KEY: &str = "csrf_token";

/// 64 hex chars from two random UUIDs.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// The session's token, created on first use.
pub async fn ensure_token(session: &Session) -> AppResult<String> {
    if let Some(token) = session.get::<String>(CSRF_SESSION_KEY).await.map_err(session_error)? {
        return Ok(token);
    }
    rotate_token(session).await
}

/// Replaces the token; called after login so a pre-login token stops working.
pub async fn rotate_token(session: &Session) -> AppResult<String> {
    let token = generate_token();
    session.insert(CSRF_SESSION_KEY, &token).await.map_err(session_error)?;
    Ok(token)
}

/// Compares the submitted token with the session's. A mismatch is audited
/// and becomes `CsrfRejected` (403).
pub async fn verify_token(session: &Session, submitted: &str, action: &str, audit: &dyn AuditSink) -> AppResult<()> {
    let expected = session.get::<String>(CSRF_SESSION_KEY).await.map_err(session_error)?;
    match expected {
        Some(expected) if !submitted.is_empty() && constant_time_eq(expected.as_bytes(), submitted.as_bytes()) => {
            Ok(())
        }
        _ => {
            audit.record(&format!("CSRF token validation failed: {}", action), Severity::Warning);
            Err(AppError::CsrfRejected)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audit_service::MemoryAuditSink;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[test]
    fn tokens_are_long_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn comparison_checks_length_and_content() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[tokio::test]
    async fn matching_token_passes() {
        let session = session();
        let audit = MemoryAuditSink::default();
        let token = ensure_token(&session).await.unwrap();
        assert_eq!(ensure_token(&session).await.unwrap(), token);
        assert!(verify_token(&session, &token, "test", &audit).await.is_ok());
        assert!(audit.messages().is_empty());
    }

    #[tokio::test]
    async fn rotated_token_invalidates_the_old_one() {
        let session = session();
        let audit = MemoryAuditSink::default();
        let old = ensure_token(&session).await.unwrap();
        let new = rotate_token(&session).await.unwrap();
        assert!(matches!(verify_token(&session, &old, "delete", &audit).await, Err(AppError::CsrfRejected)));
        assert!(verify_token(&session, &new, "delete", &audit).await.is_ok());

        let events = audit.messages();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, Severity::Warning);
        assert!(events[0].0.contains("delete"));
    }

    #[tokio::test]
    async fn missing_session_token_is_rejected() {
        let audit = MemoryAuditSink::default();
        assert!(verify_token(&session(), "", "login", &audit).await.is_err());
    }
}
