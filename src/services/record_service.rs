// src/services/record_service.rs
use crate::{
    error::AppResult,
    models::record::{HealthRecord, NewRecord, RecordRow},
    services::{
        audit_service::{AuditSink, Severity},
        filter_service::RecordQuery,
    },
};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const RECORD_COLUMNS: &str =
    "id, email, full_name, gender, age, temp, diagnosed, encountered, vaccinated, nationality";

/// Local wall-clock time to the second, matching what SQLite's
/// `datetime('now', 'localtime')` writes.
pub fn current_time() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

fn select_from_records(timestamped: bool) -> String {
    if timestamped {
        format!("SELECT {}, created_at FROM records", RECORD_COLUMNS)
    } else {
        format!("SELECT {}, NULL AS created_at FROM records", RECORD_COLUMNS)
    }
}

/// Converts fetched rows, dropping out-of-domain ones so a single bad row
/// cannot blank a whole listing. Each dropped row is audited.
fn into_records(rows: Vec<RecordRow>, audit: &dyn AuditSink) -> Vec<HealthRecord> {
    rows.into_iter()
        .filter_map(|row| match HealthRecord::try_from(row) {
            Ok(record) => Some(record),
            Err(e) => {
                audit.record(&format!("Skipped unreadable row: {}", e), Severity::Warning);
                None
            }
        })
        .collect()
}

/// Stores a declaration stamped with `now`. A legacy table without
/// `created_at` gets the attribute columns only.
pub async fn insert_record(db_pool: &SqlitePool, record: &NewRecord, now: NaiveDateTime) -> AppResult<i64> {
    let timestamped = has_column(db_pool, "created_at").await?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "INSERT INTO records (email, full_name, gender, age, temp, diagnosed, encountered, vaccinated, nationality",
    );
    if timestamped {
        qb.push(", created_at");
    }
    qb.push(") VALUES (");
    let mut values = qb.separated(", ");
    values
        .push_bind(&record.email)
        .push_bind(&record.full_name)
        .push_bind(record.gender.as_str())
        .push_bind(record.age)
        .push_bind(record.temp)
        .push_bind(record.diagnosed.as_str())
        .push_bind(record.encountered.as_str())
        .push_bind(record.vaccinated.as_str())
        .push_bind(&record.nationality);
    if timestamped {
        values.push_bind(now);
    }
    qb.push(")");

    let result = qb.build().execute(db_pool).await?;

    let id = result.last_insert_rowid();
    tracing::info!("📝 Declaration {} stored", id);
    Ok(id)
}

/// Rewrites the attribute columns. `created_at` keeps the original submission time.
pub async fn update_record(db_pool: &SqlitePool, id: i64, record: &NewRecord) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE records SET email = ?, full_name = ?, gender = ?, age = ?, temp = ?, \
         diagnosed = ?, encountered = ?, vaccinated = ?, nationality = ? WHERE id = ?",
    )
    .bind(&record.email)
    .bind(&record.full_name)
    .bind(record.gender.as_str())
    .bind(record.age)
    .bind(record.temp)
    .bind(record.diagnosed.as_str())
    .bind(record.encountered.as_str())
    .bind(record.vaccinated.as_str())
    .bind(&record.nationality)
    .bind(id)
    .execute(db_pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_record(db_pool: &SqlitePool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM records WHERE id = ?")
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_record(db_pool: &SqlitePool, id: i64) -> AppResult<Option<HealthRecord>> {
    let timestamped = has_column(db_pool, "created_at").await?;
    let sql = format!("{} WHERE id = ?", select_from_records(timestamped));
    let row = sqlx::query_as::<_, RecordRow>(&sql)
        .bind(id)
        .fetch_optional(db_pool)
        .await?;
    row.map(HealthRecord::try_from).transpose()
}

/// Rows matching `query`, newest first.
pub async fn list_records(
    db_pool: &SqlitePool,
    query: &RecordQuery,
    audit: &dyn AuditSink,
) -> AppResult<Vec<HealthRecord>> {
    let mut qb = QueryBuilder::<Sqlite>::new(select_from_records(query.timestamped));
    query.push_where(&mut qb);
    qb.push(" ORDER BY id DESC");

    let rows = qb.build_query_as::<RecordRow>().fetch_all(db_pool).await?;
    Ok(into_records(rows, audit))
}

pub async fn count_records(db_pool: &SqlitePool, query: &RecordQuery) -> AppResult<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM records");
    query.push_where(&mut qb);
    let count = qb.build_query_scalar::<i64>().fetch_one(db_pool).await?;
    Ok(count)
}

pub async fn find_records_by_email(
    db_pool: &SqlitePool,
    email: &str,
    audit: &dyn AuditSink,
) -> AppResult<Vec<HealthRecord>> {
    let timestamped = has_column(db_pool, "created_at").await?;
    let sql = format!("{} WHERE email = ? ORDER BY id DESC", select_from_records(timestamped));
    let rows = sqlx::query_as::<_, RecordRow>(&sql)
        .bind(email)
        .fetch_all(db_pool)
        .await?;
    Ok(into_records(rows, audit))
}

/// Submission summary for one account's email address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailActivity {
    pub submissions: i64,
    pub first_submission: Option<NaiveDateTime>,
    pub last_submission: Option<NaiveDateTime>,
}

pub async fn email_activity(db_pool: &SqlitePool, email: &str) -> AppResult<EmailActivity> {
    if !has_column(db_pool, "created_at").await? {
        let submissions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE email = ?")
            .bind(email)
            .fetch_one(db_pool)
            .await?;
        return Ok(EmailActivity { submissions, ..Default::default() });
    }

    let (submissions, first_submission, last_submission): (i64, Option<NaiveDateTime>, Option<NaiveDateTime>) =
        sqlx::query_as("SELECT COUNT(*), MIN(created_at), MAX(created_at) FROM records WHERE email = ?")
            .bind(email)
            .fetch_one(db_pool)
            .await?;
    Ok(EmailActivity { submissions, first_submission, last_submission })
}

pub async fn has_column(db_pool: &SqlitePool, column: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info('records') WHERE name = ?")
        .bind(column)
        .fetch_one(db_pool)
        .await?;
    Ok(count > 0)
}

/// Earliest and latest `created_at`, or `None` for an empty table.
pub async fn created_at_bounds(db_pool: &SqlitePool) -> AppResult<Option<(NaiveDateTime, NaiveDateTime)>> {
    let (min, max): (Option<NaiveDateTime>, Option<NaiveDateTime>) =
        sqlx::query_as("SELECT MIN(created_at), MAX(created_at) FROM records")
            .fetch_one(db_pool)
            .await?;
    Ok(min.zip(max))
}
