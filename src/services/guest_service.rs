// src/services/guest_service.rs
use crate::{
    error::AppResult,
    models::guest::{Eligibility, GuestUsage, UsageStatus},
};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;

pub async fn find_usage(db_pool: &SqlitePool, ip: &str) -> AppResult<Option<GuestUsage>> {
    let usage = sqlx::query_as::<_, GuestUsage>(
        "SELECT ip_address, usage_count, usage_date, created_at, updated_at, last_reset \
         FROM guest_usage WHERE ip_address = ?",
    )
    .bind(ip)
    .fetch_optional(db_pool)
    .await?;
    Ok(usage)
}

/// Submissions this address may still make today (never negative).
pub async fn check_guest_limit(db_pool: &SqlitePool, ip: &str, today: NaiveDate, limit: i64) -> AppResult<i64> {
    let used = find_usage(db_pool, ip)
        .await?
        .map(|usage| usage.usage_on(today))
        .unwrap_or(0);
    Ok((limit - used).max(0))
}

/// Counts one submission for `ip`. Returns `false` without writing when the
/// address has no submissions left today. A counter from an earlier day restarts at one.
/// The limit is checked inside the upsert itself.
pub async fn record_guest_usage(db_pool: &SqlitePool, ip: &str, now: NaiveDateTime, limit: i64) -> AppResult<bool> {
    if limit <= 0 {
        return Ok(false);
    }

    let result = sqlx::query(
        "INSERT INTO guest_usage (ip_address, usage_count, usage_date, created_at, updated_at) \
         VALUES (?1, 1, ?2, ?3, ?3) \
         ON CONFLICT (ip_address) DO UPDATE SET \
             usage_count = CASE WHEN usage_date = excluded.usage_date THEN usage_count + 1 ELSE 1 END, \
             usage_date = excluded.usage_date, \
             updated_at = excluded.updated_at \
         WHERE usage_date <> excluded.usage_date OR usage_count < ?4",
    )
    .bind(ip)
    .bind(now.date())
    .bind(now)
    .bind(limit)
    .execute(db_pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::warn!("Guest limit exceeded for {}", ip);
        return Ok(false);
    }
    tracing::debug!("Guest submission recorded for {}", ip);
    Ok(true)
}

/// Signed-in staff are never limited; guests get their remaining quota.
pub async fn eligibility(
    db_pool: &SqlitePool,
    ip: &str,
    signed_in: bool,
    today: NaiveDate,
    limit: i64,
) -> AppResult<Eligibility> {
    if signed_in {
        return Ok(Eligibility::Unlimited);
    }
    let remaining = check_guest_limit(db_pool, ip, today, limit).await?;
    Ok(Eligibility::Guest { remaining, limit, status: UsageStatus::from_remaining(remaining) })
}
