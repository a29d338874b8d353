// src/web/dashboard_handlers.rs
use crate::{
    error::AppResult,
    models::{
        dashboard::{DashboardContext, Kpi, KpiFilter, KpiTrends, QuickFilter, TimeRange},
        record::HealthRecord,
    },
    services::{
        audit_service::Severity,
        filter_service::{self, DashboardFilter},
        record_service,
        trend_service::{self, TrendReport},
    },
    state::AppState,
    templates::{DashboardPage, KpiTile, NavLink, RecordView},
    web::{csrf, mw_auth::CurrentUser, render, session_error},
};
use axum::{
    extract::{Extension, Query, State},
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

pub const TIME_RANGE_SESSION_KEY: &str = "dashboard_time_range";

const QUICK_FILTERS: [QuickFilter; 4] =
    [QuickFilter::Vaccinated, QuickFilter::Encountered, QuickFilter::Fever, QuickFilter::Today];

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub range: Option<String>,
    pub filter: Option<String>,
    pub quick: Option<String>,
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Builds the request context. An explicit `range` wins and is remembered in
/// the session; otherwise the remembered one is used, then `all`.
pub async fn resolve_context(session: &Session, params: &DashboardParams) -> AppResult<DashboardContext> {
    let requested = params.range.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let range = match requested {
        Some(raw) => {
            let range = TimeRange::from_param(raw);
            session
                .insert(TIME_RANGE_SESSION_KEY, range.as_param())
                .await
                .map_err(session_error)?;
            range
        }
        None => session
            .get::<String>(TIME_RANGE_SESSION_KEY)
            .await
            .map_err(session_error)?
            .map(|saved| TimeRange::from_param(&saved))
            .unwrap_or_default(),
    };

    Ok(DashboardContext {
        now: record_service::current_time(),
        range,
        kpi: KpiFilter::from_param(params.filter.as_deref().unwrap_or_default()),
        quick: QuickFilter::from_param(params.quick.as_deref().unwrap_or_default()),
    })
}

/// Rows and trends for one request. Store failures degrade to empty data.
async fn load_dashboard(state: &AppState, ctx: &DashboardContext) -> (DashboardFilter, Vec<HealthRecord>, TrendReport) {
    let audit = state.audit.as_ref();
    let filter = filter_service::build_dashboard_filter(&state.db_pool, ctx, audit).await;
    let report = trend_service::trend_report(&state.db_pool, &filter, audit).await;
    let rows = match record_service::list_records(&state.db_pool, &filter.listing, audit).await {
        Ok(rows) => rows,
        Err(e) => {
            audit.record(&format!("Dashboard listing query failed: {}", e), Severity::Error);
            Vec::new()
        }
    };
    (filter, rows, report)
}

fn dashboard_href(range: TimeRange, kpi: KpiFilter, quick: QuickFilter) -> String {
    let mut href = format!("/dashboard?range={}", range.as_param());
    if kpi.is_active() {
        href.push_str(&format!("&filter={}", kpi.as_param()));
    }
    if quick.is_active() {
        href.push_str(&format!("&quick={}", quick.as_param()));
    }
    href
}

fn kpi_tiles(ctx: &DashboardContext, trends: &KpiTrends) -> Vec<KpiTile> {
    Kpi::ALL
        .iter()
        .map(|kpi| {
            let trend = trends.get(*kpi);
            let target = kpi.filter();
            let active = target.is_active() && target == ctx.kpi;
            // clicking the active tile clears it
            let next = if active { KpiFilter::None } else { target };
            KpiTile {
                label: kpi.label(),
                current: trend.current,
                previous: trend.previous,
                arrow: trend.indicator.arrow,
                percentage: trend.indicator.percentage.clone(),
                trend: trend.indicator.trend.as_str(),
                href: dashboard_href(ctx.range, next, ctx.quick),
                active,
            }
        })
        .collect()
}

// GET /dashboard
pub async fn show_dashboard(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<DashboardParams>,
) -> AppResult<Html<String>> {
    let ctx = resolve_context(&session, &params).await?;
    tracing::debug!("GET /dashboard for '{}': {:?}", user.username, ctx);
    let (filter, rows, report) = load_dashboard(&state, &ctx).await;

    let ranges = TimeRange::ALL
        .iter()
        .map(|range| NavLink {
            label: range.label(),
            href: dashboard_href(*range, ctx.kpi, ctx.quick),
            active: *range == ctx.range,
        })
        .collect();
    let quick_links = QUICK_FILTERS
        .iter()
        .map(|quick| {
            let active = *quick == ctx.quick;
            let next = if active { QuickFilter::None } else { *quick };
            NavLink { label: quick.label(), href: dashboard_href(ctx.range, ctx.kpi, next), active }
        })
        .collect();
    let active_filters = [ctx.kpi.label(), ctx.quick.label()]
        .into_iter()
        .filter(|label| !label.is_empty())
        .collect();

    let page = DashboardPage {
        username: user.username,
        csrf_token: csrf::ensure_token(&session).await?,
        range_label: ctx.range.label(),
        comparison_label: ctx.range.comparison_label(),
        ranges,
        quick_links,
        tiles: kpi_tiles(&ctx, &report.trends()),
        active_filters,
        clear_href: dashboard_href(ctx.range, KpiFilter::None, QuickFilter::None),
        rows: rows.into_iter().map(RecordView::from).collect(),
        degraded: filter.degraded,
        success_message: params.success,
        error_message: params.error,
    };
    render(&page)
}

/// Renderer payload.
#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub rows: Vec<HealthRecord>,
    pub trends: KpiTrends,
    pub range: TimeRange,
    pub filter: KpiFilter,
    pub quick: QuickFilter,
    pub degraded: bool,
}

// GET /dashboard/data
pub async fn dashboard_data(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<DashboardParams>,
) -> AppResult<Json<DashboardData>> {
    let ctx = resolve_context(&session, &params).await?;
    let (filter, rows, report) = load_dashboard(&state, &ctx).await;
    Ok(Json(DashboardData {
        rows,
        trends: report.trends(),
        range: ctx.range,
        filter: ctx.kpi,
        quick: ctx.quick,
        degraded: filter.degraded,
    }))
}
