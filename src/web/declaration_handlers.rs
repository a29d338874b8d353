// src/web/declaration_handlers.rs
use crate::{
    error::AppResult,
    models::{
        guest::{Eligibility, UsageStatus},
        record::DeclarationForm,
    },
    services::{guest_service, record_service},
    state::AppState,
    templates::DeclarationPage,
    web::{
        client_ip::ClientIp,
        csrf,
        flash::{self, Flash, FlashKind},
        mw_auth, redirect_with, render,
    },
};
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use tower_sessions::Session;

fn quota_class(eligibility: &Eligibility) -> &'static str {
    match eligibility {
        Eligibility::Unlimited => "alert-success",
        Eligibility::Guest { status: UsageStatus::LimitReached, .. } => "alert-error",
        Eligibility::Guest { .. } => "alert-info",
    }
}

fn declaration_page(
    form: DeclarationForm,
    errors: Vec<String>,
    csrf_token: String,
    signed_in: bool,
    eligibility: &Eligibility,
    flash: Option<Flash>,
) -> DeclarationPage {
    DeclarationPage {
        form,
        errors,
        csrf_token,
        signed_in,
        allowed: eligibility.allowed(),
        quota_message: eligibility.message(),
        quota_class: quota_class(eligibility),
        flash,
    }
}

// GET /declare
pub async fn show_declaration_form(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    ClientIp(ip): ClientIp,
) -> AppResult<Response> {
    let signed_in = mw_auth::session_user_id(&session).await?.is_some();
    let today = record_service::current_time().date();
    let eligibility = guest_service::eligibility(
        &state.db_pool,
        &ip.to_string(),
        signed_in,
        today,
        state.config.guest_daily_limit,
    )
    .await?;

    let page = declaration_page(
        DeclarationForm::default(),
        Vec::new(),
        csrf::ensure_token(&session).await?,
        signed_in,
        &eligibility,
        flash::take_flash(&cookies, &state.cookie_key),
    );
    Ok(render(&page)?.into_response())
}

// POST /declare
pub async fn handle_declaration(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    ClientIp(ip): ClientIp,
    Form(form): Form<DeclarationForm>,
) -> AppResult<Response> {
    csrf::verify_token(&session, &form.csrf_token, "declaration", state.audit.as_ref()).await?;

    let ip = ip.to_string();
    let now = record_service::current_time();
    let limit = state.config.guest_daily_limit;
    let signed_in = mw_auth::session_user_id(&session).await?.is_some();

    let eligibility = guest_service::eligibility(&state.db_pool, &ip, signed_in, now.date(), limit).await?;
    if !eligibility.allowed() {
        tracing::warn!("Declaration refused for {}: daily guest limit reached", ip);
        flash::set_flash(&cookies, &state.cookie_key, FlashKind::Error, &eligibility.message());
        return Ok(Redirect::to("/declare").into_response());
    }

    let new_record = match form.validate() {
        Ok(record) => record,
        Err(errors) => {
            tracing::warn!("Declaration rejected: {} validation error(s)", errors.len());
            let page = declaration_page(
                form,
                errors,
                csrf::ensure_token(&session).await?,
                signed_in,
                &eligibility,
                None,
            );
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, render(&page)?).into_response());
        }
    };

    if signed_in {
        record_service::insert_record(&state.db_pool, &new_record, now).await?;
        return Ok(Redirect::to(&redirect_with("/dashboard", "success", "Declaration recorded.")).into_response());
    }

    // claim the quota slot before storing
    if !guest_service::record_guest_usage(&state.db_pool, &ip, now, limit).await? {
        tracing::warn!("Declaration refused for {}: quota taken by a concurrent submission", ip);
        let refused = guest_service::eligibility(&state.db_pool, &ip, false, now.date(), limit).await?;
        flash::set_flash(&cookies, &state.cookie_key, FlashKind::Error, &refused.message());
        return Ok(Redirect::to("/declare").into_response());
    }
    let id = record_service::insert_record(&state.db_pool, &new_record, now).await?;
    let remaining = guest_service::check_guest_limit(&state.db_pool, &ip, now.date(), limit).await?;
    tracing::info!("Guest declaration {} from {} ({} left today)", id, ip, remaining);
    flash::set_flash(
        &cookies,
        &state.cookie_key,
        FlashKind::Success,
        &format!(
            "Thank you! Your health declaration has been recorded. You have {} submission(s) remaining today.",
            remaining
        ),
    );
    Ok(Redirect::to("/declare").into_response())
}
