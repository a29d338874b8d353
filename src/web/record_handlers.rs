// src/web/record_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::record::DeclarationForm,
    services::{audit_service::Severity, record_service},
    state::AppState,
    templates::EditRecordPage,
    web::{csrf, mw_auth::CurrentUser, redirect_with, render, CsrfForm},
};
use axum::{
    extract::{Extension, Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// GET /records/{id}/edit
pub async fn show_edit_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let record = record_service::find_record(&state.db_pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let page = EditRecordPage {
        record_id: record.id,
        form: DeclarationForm::from_record(&record),
        errors: Vec::new(),
        csrf_token: csrf::ensure_token(&session).await?,
    };
    Ok(render(&page)?.into_response())
}

// POST /records/{id}/edit
pub async fn handle_edit(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<DeclarationForm>,
) -> AppResult<Response> {
    csrf::verify_token(&session, &form.csrf_token, "record update", state.audit.as_ref()).await?;

    let updated = match form.validate() {
        Ok(record) => record,
        Err(errors) => {
            tracing::warn!("Update of record {} rejected: {:?}", id, errors);
            let page = EditRecordPage {
                record_id: id,
                form,
                errors,
                csrf_token: csrf::ensure_token(&session).await?,
            };
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, render(&page)?).into_response());
        }
    };

    if !record_service::update_record(&state.db_pool, id, &updated).await? {
        tracing::warn!("Update of missing record {}", id);
        return Ok(Redirect::to(&redirect_with("/dashboard", "error", "Record not found.")).into_response());
    }

    state.audit.record(&format!("Record {} updated by user: {}", id, user.username), Severity::Info);
    Ok(Redirect::to(&redirect_with("/dashboard", "success", &format!("Record #{} updated.", id))).into_response())
}

// POST /records/{id}/delete
pub async fn handle_delete(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> AppResult<Redirect> {
    csrf::verify_token(&session, &form.csrf_token, "record delete", state.audit.as_ref()).await?;

    if record_service::delete_record(&state.db_pool, id).await? {
        state.audit.record(&format!("Record {} deleted by user: {}", id, user.username), Severity::Info);
        Ok(Redirect::to(&redirect_with("/dashboard", "success", &format!("Record #{} deleted.", id))))
    } else {
        tracing::warn!("Delete of missing record {}", id);
        Ok(Redirect::to(&redirect_with("/dashboard", "error", "Record not found.")))
    }
}
