// src/main.rs

// --- Modules ---
mod config;
mod db;
mod error;
mod models;
mod services;
mod state;
mod templates;
mod web;

// --- Imports ---
use crate::{
    config::AppConfig,
    services::{
        audit_service::{TracingAuditSink, AUDIT_TARGET},
        maintenance_service, record_service,
    },
    state::AppState,
};
use anyhow::Context;
use axum::serve;
use clap::{Parser, Subcommand};
use std::{fs::OpenOptions, net::SocketAddr, path::Path, sync::{Arc, Mutex}};
use time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_cookies::{CookieManagerLayer, Key};
use tower_http::trace::TraceLayer;
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{filter::filter_fn, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "health_declaration=debug,tower_http=info,sqlx=warn,tower_sessions=info";

#[derive(Parser, Debug)]
#[command(name = "health-declaration", version, about = "COVID-19 daily health declaration server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Reset guest counters, purge stale usage rows and optimize the database
    Maintenance {
        /// Keep guest usage rows updated within this many days
        #[arg(long)]
        days: Option<i64>,
    },
}

/// stdout layer filtered by RUST_LOG, plus an append-only audit file that
/// only receives events on the `audit` target.
fn init_tracing(audit_log_path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = audit_log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let audit_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_log_path)
        .with_context(|| format!("opening audit log {}", audit_log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(env_filter))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(audit_file))
                .with_ansi(false)
                .with_filter(filter_fn(|meta| meta.target() == AUDIT_TARGET)),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&AppConfig::audit_log_path_from_env())?;

    let config = AppConfig::from_env().context("loading configuration")?;

    // --- Database ---
    let db_pool = match db::create_db_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Failed to initialize the database: {}", e);
            return Err(anyhow::anyhow!("Failed to connect/migrate DB: {}", e));
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve_app(config, db_pool).await,
        Command::Maintenance { days } => {
            let retention_days = days.unwrap_or(config.retention_days);
            let report = maintenance_service::run_maintenance(
                &db_pool,
                record_service::current_time(),
                retention_days,
                &TracingAuditSink,
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            db_pool.close().await;
            if report.succeeded() {
                Ok(())
            } else {
                Err(anyhow::anyhow!("Some maintenance steps failed, see the audit log"))
            }
        }
    }
}

async fn serve_app(config: AppConfig, db_pool: sqlx::SqlitePool) -> anyhow::Result<()> {
    tracing::info!("🚀 Starting health declaration server...");

    // --- Sessions ---
    let session_store = SqliteStore::new(db_pool.clone())
        .with_table_name("sessions")
        .map_err(|e| anyhow::anyhow!("Failed to create session store: {}", e))?;
    session_store.migrate().await?;

    let cleanup_store = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = cleanup_store
            .continuously_delete_expired(tokio::time::Duration::from_secs(60 * 60))
            .await
        {
            tracing::error!("Session cleanup task failed: {:?}", e);
        }
    });
    tracing::info!("🧹 Session cleanup task started.");

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(config.session_idle_minutes)));
    tracing::info!("🔑 Session layer configured.");

    let cookie_key = Key::try_from(config.session_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid SESSION_SECRET for cookie signing: {}", e))?;

    // --- Application state ---
    let bind_addr = config.bind_addr;
    let app_state = AppState {
        db_pool,
        config: Arc::new(config),
        cookie_key,
        audit: Arc::new(TracingAuditSink),
    };

    // --- Listener ---
    tracing::info!("📡 Listening on http://{}", bind_addr);
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("❌ Failed to bind {}: {}", bind_addr, e);
            return Err(e.into());
        }
    };

    // --- Router and middleware ---
    let app = web::routes::create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CookieManagerLayer::new())
            .layer(session_layer),
    );
    tracing::info!("✅ Router and middleware configured.");

    if let Err(e) = serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await {
        tracing::error!("❌ Fatal server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
