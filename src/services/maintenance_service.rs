// src/services/maintenance_service.rs
//! Daily housekeeping run from the command line, never from a request.

use crate::{
    error::AppResult,
    services::audit_service::{AuditSink, Severity},
};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Instant;

/// Outcome of one maintenance step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Done { rows: u64 },
    Failed { error: String },
}

impl StepOutcome {
    fn from_result(result: AppResult<u64>) -> Self {
        match result {
            Ok(rows) => StepOutcome::Done { rows },
            Err(e) => StepOutcome::Failed { error: e.to_string() },
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, StepOutcome::Done { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub started_at: NaiveDateTime,
    pub retention_days: i64,
    pub reset: StepOutcome,
    pub purge: StepOutcome,
    pub optimize: StepOutcome,
    pub duration_ms: u128,
}

impl MaintenanceReport {
    /// Optimisation is best effort; only reset and purge decide success.
    pub fn succeeded(&self) -> bool {
        self.reset.succeeded() && self.purge.succeeded()
    }
}

/// Zeroes every guest counter that is above zero and stamps `last_reset`.
pub async fn reset_guest_counters(db_pool: &SqlitePool, now: NaiveDateTime) -> AppResult<u64> {
    let result = sqlx::query("UPDATE guest_usage SET usage_count = 0, last_reset = ? WHERE usage_count > 0")
        .bind(now)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes guest rows not updated within `retention_days`.
pub async fn purge_stale_usage(db_pool: &SqlitePool, now: NaiveDateTime, retention_days: i64) -> AppResult<u64> {
    let cutoff = now - Duration::days(retention_days);
    let result = sqlx::query("DELETE FROM guest_usage WHERE updated_at < ?")
        .bind(cutoff)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn optimize(db_pool: &SqlitePool) -> AppResult<u64> {
    sqlx::query("PRAGMA optimize").execute(db_pool).await?;
    Ok(0)
}

pub async fn run_maintenance(
    db_pool: &SqlitePool,
    now: NaiveDateTime,
    retention_days: i64,
    audit: &dyn AuditSink,
) -> MaintenanceReport {
    let started = Instant::now();
    tracing::info!("🧹 Daily maintenance started (retention {} days)", retention_days);

    let reset = StepOutcome::from_result(reset_guest_counters(db_pool, now).await);
    let purge = StepOutcome::from_result(purge_stale_usage(db_pool, now, retention_days).await);
    let optimize = StepOutcome::from_result(optimize(db_pool).await);

    let report = MaintenanceReport {
        started_at: now,
        retention_days,
        reset,
        purge,
        optimize,
        duration_ms: started.elapsed().as_millis(),
    };

    for (step, outcome) in [("reset", &report.reset), ("purge", &report.purge), ("optimize", &report.optimize)] {
        match outcome {
            StepOutcome::Done { rows } => tracing::info!("Maintenance {}: {} row(s)", step, rows),
            StepOutcome::Failed { error } => {
                let severity = if step == "optimize" { Severity::Warning } else { Severity::Error };
                audit.record(&format!("Maintenance step {} failed: {}", step, error), severity);
            }
        }
    }
    tracing::info!("🧹 Daily maintenance finished in {} ms", report.duration_ms);
    report
}
