// src/web/mw_auth.rs
use crate::{
    error::AppResult,
    models::user::User,
    services::user_service,
    state::AppState,
    web::session_error,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

pub const USER_ID_SESSION_KEY: &str = "user_id";

/// Signed-in account, inserted into request extensions by `require_auth`.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// The signed-in user's ID, if any.
pub async fn session_user_id(session: &Session) -> AppResult<Option<i64>> {
    session.get::<i64>(USER_ID_SESSION_KEY).await.map_err(session_error)
}

/// Lets the request through only with a session pointing at an existing account.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let Some(user_id) = session_user_id(&session).await? else {
        tracing::debug!("Auth MW: no user_id in session, redirecting to /login");
        return Ok(Redirect::to("/login").into_response());
    };

    match user_service::find_user_by_id(&state.db_pool, user_id).await? {
        Some(user) => {
            tracing::debug!("Auth MW: user '{}' authenticated", user.username);
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        None => {
            // account removed while the session was alive
            tracing::warn!("Auth MW: session points at missing user {}", user_id);
            session.flush().await.map_err(session_error)?;
            Ok(Redirect::to("/login").into_response())
        }
    }
}
