// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{LoginForm, SignupForm},
    services::{
        audit_service::Severity,
        auth_service::{self, RateLimit},
        record_service, user_service,
    },
    state::AppState,
    templates::{LoginPage, SignupPage},
    web::{
        csrf, mw_auth, redirect_with, render, session_error, CsrfForm, FeedbackParams,
    },
};
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

const LOGIN_RATE_LIMIT_KEY: &str = "rate_limit_login";

// GET /login
pub async fn show_login_form(session: Session, Query(params): Query<FeedbackParams>) -> AppResult<Response> {
    if mw_auth::session_user_id(&session).await?.is_some() {
        tracing::debug!("GET /login: already signed in, redirecting to /dashboard");
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let page = LoginPage {
        error: params.error,
        success: params.success,
        login: String::new(),
        csrf_token: csrf::ensure_token(&session).await?,
    };
    Ok(render(&page)?.into_response())
}

async fn login_error(session: &Session, status: StatusCode, login: &str, message: &str) -> AppResult<Response> {
    let page = LoginPage {
        error: Some(message.to_string()),
        success: None,
        login: login.to_string(),
        csrf_token: csrf::ensure_token(session).await?,
    };
    Ok((status, render(&page)?).into_response())
}

// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    csrf::verify_token(&session, &form.csrf_token, "login", state.audit.as_ref()).await?;

    let mut rate_limit: RateLimit = session
        .get(LOGIN_RATE_LIMIT_KEY)
        .await
        .map_err(session_error)?
        .unwrap_or_default();
    let allowed = rate_limit.try_acquire_login(record_service::current_time());
    session.insert(LOGIN_RATE_LIMIT_KEY, &rate_limit).await.map_err(session_error)?;
    if !allowed {
        state.audit.record("Rate limit exceeded for login attempts", Severity::Warning);
        return login_error(
            &session,
            StatusCode::TOO_MANY_REQUESTS,
            &form.login,
            "Too many login attempts. Please try again in 15 minutes.",
        )
        .await;
    }

    let login = form.login.trim();
    if login.is_empty() || form.password.is_empty() {
        return login_error(&session, StatusCode::OK, login, "Fill in all fields.").await;
    }

    tracing::info!("Login attempt for: {}", login);
    match auth_service::authenticate(&state.db_pool, login, &form.password).await {
        Ok(user) => {
            session
                .cycle_id()
                .await
                .map_err(|e| AppError::SessionError(format!("Failed to cycle ID: {}", e)))?;
            session
                .insert(mw_auth::USER_ID_SESSION_KEY, user.id)
                .await
                .map_err(session_error)?;
            csrf::rotate_token(&session).await?;

            tracing::info!("✅ Login successful for: {}", user.username);
            Ok(Redirect::to("/dashboard").into_response())
        }
        Err(AppError::InvalidCredentials) => {
            state.audit.record(&format!("Failed login attempt for user: {}", login), Severity::Warning);
            login_error(&session, StatusCode::UNAUTHORIZED, login, "Invalid username/email or password.").await
        }
        Err(e) => Err(e),
    }
}

// GET /signup
pub async fn show_signup_form(session: Session) -> AppResult<Response> {
    if mw_auth::session_user_id(&session).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let page = SignupPage {
        errors: Vec::new(),
        username: String::new(),
        email: String::new(),
        csrf_token: csrf::ensure_token(&session).await?,
    };
    Ok(render(&page)?.into_response())
}

// POST /signup
pub async fn handle_signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    csrf::verify_token(&session, &form.csrf_token, "signup", state.audit.as_ref()).await?;

    let username = form.username.trim();
    let email = form.email.trim();
    let mut errors: Vec<String> = form.validate().into_iter().map(String::from).collect();
    if errors.is_empty() {
        if user_service::username_taken(&state.db_pool, username).await? {
            errors.push("That username is already taken.".to_string());
        }
        if user_service::email_taken(&state.db_pool, email).await? {
            errors.push("That email is already registered.".to_string());
        }
    }

    if !errors.is_empty() {
        tracing::warn!("Signup rejected for '{}': {:?}", username, errors);
        let page = SignupPage {
            errors,
            username: username.to_string(),
            email: email.to_string(),
            csrf_token: csrf::ensure_token(&session).await?,
        };
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, render(&page)?).into_response());
    }

    user_service::create_user(&state.db_pool, username, email, &form.password).await?;
    state.audit.record(&format!("New account created: {}", username), Severity::Info);
    Ok(Redirect::to(&redirect_with("/login", "success", "Account created. You can log in now.")).into_response())
}

// POST /logout
pub async fn handle_logout(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> AppResult<Redirect> {
    csrf::verify_token(&session, &form.csrf_token, "logout", state.audit.as_ref()).await?;
    let user_id = mw_auth::session_user_id(&session).await?;

    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to delete session: {}", e)))?;

    match user_id {
        Some(id) => tracing::info!("🚪 User {} logged out.", id),
        None => tracing::info!("🚪 Anonymous session closed."),
    }
    Ok(Redirect::to("/login"))
}
