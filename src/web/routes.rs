// src/web/routes.rs
use crate::{
    state::AppState,
    web::{auth_handlers, dashboard_handlers, declaration_handlers, mw_auth, profile_handlers, record_handlers},
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    // --- Public routes ---
    let public_routes = Router::new()
        .route("/", get(|| async { axum::response::Redirect::permanent("/declare") }))
        .route(
            "/declare",
            get(declaration_handlers::show_declaration_form).post(declaration_handlers::handle_declaration),
        )
        .route("/login", get(auth_handlers::show_login_form).post(auth_handlers::handle_login))
        .route("/signup", get(auth_handlers::show_signup_form).post(auth_handlers::handle_signup))
        .route("/logout", post(auth_handlers::handle_logout));

    let record_routes = Router::new()
        .route("/{id}/edit", get(record_handlers::show_edit_form).post(record_handlers::handle_edit))
        .route("/{id}/delete", post(record_handlers::handle_delete));

    // --- Authenticated routes ---
    let authenticated_routes = Router::new()
        .route("/dashboard", get(dashboard_handlers::show_dashboard))
        .route("/dashboard/data", get(dashboard_handlers::dashboard_data))
        .route("/profile", get(profile_handlers::show_profile))
        .route("/profile/export", post(profile_handlers::handle_export))
        .nest("/records", record_routes)
        .route_layer(middleware::from_fn_with_state(app_state.clone(), mw_auth::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .with_state(app_state)
}
