// src/web/profile_handlers.rs
use crate::{
    error::{AppError, AppResult},
    services::{audit_service::Severity, record_service},
    state::AppState,
    templates::{display_datetime, ProfilePage, RecordView},
    web::{csrf, mw_auth::CurrentUser, render, CsrfForm},
};
use axum::{
    extract::{Extension, Form, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use tower_sessions::Session;

// GET /profile
pub async fn show_profile(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Html<String>> {
    let records = record_service::find_records_by_email(&state.db_pool, &user.email, state.audit.as_ref()).await?;
    let activity = record_service::email_activity(&state.db_pool, &user.email).await?;

    let page = ProfilePage {
        username: user.username,
        email: user.email,
        member_since: display_datetime(user.created_at),
        submissions: activity.submissions,
        first_submission: display_datetime(activity.first_submission),
        last_submission: display_datetime(activity.last_submission),
        rows: records.into_iter().map(RecordView::from).collect(),
        csrf_token: csrf::ensure_token(&session).await?,
    };
    render(&page)
}

// POST /profile/export
pub async fn handle_export(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<CsrfForm>,
) -> AppResult<Response> {
    csrf::verify_token(&session, &form.csrf_token, "data export", state.audit.as_ref()).await?;

    let records = record_service::find_records_by_email(&state.db_pool, &user.email, state.audit.as_ref()).await?;
    let body = serde_json::to_string_pretty(&records).map_err(|e| {
        tracing::error!("Export serialization failed: {}", e);
        AppError::InternalServerError
    })?;
    state.audit.record(&format!("Data export requested by user: {}", user.username), Severity::Info);

    let filename = format!(
        "attachment; filename=\"health_records_{}.json\"",
        record_service::current_time().format("%Y-%m-%d")
    );
    Ok((
        [(header::CONTENT_TYPE, "application/json".to_string()), (header::CONTENT_DISPOSITION, filename)],
        body,
    )
        .into_response())
}
