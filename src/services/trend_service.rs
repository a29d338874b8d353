// src/services/trend_service.rs
//! KPI counters for the current and comparison periods, and the
//! arrow/percentage indicator derived from each pair.

use crate::{
    error::AppResult,
    models::{
        dashboard::{DashboardContext, Kpi, KpiTrend, KpiTrends, PeriodCounters, TrendDirection, TrendIndicator},
        record::{YesNo, ADULT_AGE, FEVER_TEMP, PHILIPPINE_VARIANTS},
    },
    services::{
        audit_service::{AuditSink, Severity},
        filter_service::{self, DashboardFilter, RecordQuery},
    },
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Arrow, signed percentage and direction for one counter pair.
pub fn trend_indicator(current: i64, previous: i64) -> TrendIndicator {
    if previous == 0 {
        return if current > 0 {
            indicator(TrendDirection::Up, "100%".to_string())
        } else {
            indicator(TrendDirection::Neutral, "0%".to_string())
        };
    }

    let change = (current - previous) as f64 / previous as f64 * 100.0;
    let rounded = (change * 10.0).round() / 10.0;
    if rounded > 0.0 {
        indicator(TrendDirection::Up, format!("+{}%", format_percent(rounded)))
    } else if rounded < 0.0 {
        indicator(TrendDirection::Down, format!("-{}%", format_percent(rounded.abs())))
    } else {
        indicator(TrendDirection::Neutral, "0%".to_string())
    }
}

fn indicator(trend: TrendDirection, percentage: String) -> TrendIndicator {
    TrendIndicator { arrow: trend.arrow(), percentage, trend }
}

// 20.0 -> "20", 66.7 -> "66.7"
fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Counters for both periods of one dashboard render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendReport {
    pub current: PeriodCounters,
    pub previous: PeriodCounters,
    pub degraded: bool,
}

impl TrendReport {
    pub fn trends(&self) -> KpiTrends {
        let trend = |kpi: Kpi| {
            let current = self.current.get(kpi);
            let previous = self.previous.get(kpi);
            KpiTrend { current, previous, indicator: trend_indicator(current, previous) }
        };
        KpiTrends {
            total: trend(Kpi::Total),
            encountered: trend(Kpi::Encountered),
            vaccinated: trend(Kpi::Vaccinated),
            fever: trend(Kpi::Fever),
            adults: trend(Kpi::Adults),
            international: trend(Kpi::International),
        }
    }
}

/// Builds the filter for `ctx` and counts both periods.
pub async fn calculate_trends(db_pool: &SqlitePool, ctx: &DashboardContext, audit: &dyn AuditSink) -> TrendReport {
    let filter = filter_service::build_dashboard_filter(db_pool, ctx, audit).await;
    trend_report(db_pool, &filter, audit).await
}

/// Counts both periods of an already built filter. In degraded mode the
/// comparison side stays at zero.
pub async fn trend_report(db_pool: &SqlitePool, filter: &DashboardFilter, audit: &dyn AuditSink) -> TrendReport {
    let current = counters_or_zero(db_pool, &filter.current, "current", audit).await;
    let previous = match &filter.previous {
        Some(query) => counters_or_zero(db_pool, query, "previous", audit).await,
        None => PeriodCounters::default(),
    };
    TrendReport { current, previous, degraded: filter.degraded }
}

async fn counters_or_zero(
    db_pool: &SqlitePool,
    query: &RecordQuery,
    period: &str,
    audit: &dyn AuditSink,
) -> PeriodCounters {
    match period_counters(db_pool, query).await {
        Ok(counters) => counters,
        Err(e) => {
            audit.record(&format!("Trend calculation failed for {} period: {}", period, e), Severity::Error);
            PeriodCounters::default()
        }
    }
}

/// All six counters for the rows matching `query`, in one pass.
pub async fn period_counters(db_pool: &SqlitePool, query: &RecordQuery) -> AppResult<PeriodCounters> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total");
    push_counter(&mut qb, "encountered", |qb| {
        qb.push("encountered = ").push_bind(YesNo::Yes.as_str());
    });
    push_counter(&mut qb, "vaccinated", |qb| {
        qb.push("vaccinated = ").push_bind(YesNo::Yes.as_str());
    });
    push_counter(&mut qb, "fever", |qb| {
        qb.push("temp > ").push_bind(FEVER_TEMP);
    });
    push_counter(&mut qb, "adults", |qb| {
        qb.push("age >= ").push_bind(ADULT_AGE);
    });
    push_counter(&mut qb, "international", |qb| {
        let mut clauses = qb.separated(" AND ");
        for variant in PHILIPPINE_VARIANTS {
            clauses.push("LOWER(TRIM(nationality)) NOT LIKE ");
            clauses.push_bind_unseparated(format!("%{}%", variant));
        }
    });
    qb.push(" FROM records");
    query.push_where(&mut qb);

    let counters = qb.build_query_as::<PeriodCounters>().fetch_one(db_pool).await?;
    Ok(counters)
}

fn push_counter<F>(qb: &mut QueryBuilder<'_, Sqlite>, alias: &str, condition: F)
where
    F: FnOnce(&mut QueryBuilder<'_, Sqlite>),
{
    qb.push(", COALESCE(SUM(CASE WHEN ");
    condition(qb);
    qb.push(" THEN 1 ELSE 0 END), 0) AS ").push(alias);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        models::{
            dashboard::{KpiFilter, QuickFilter, TimeRange},
            record::{Gender, HealthRecord, NewRecord},
        },
        services::{audit_service::MemoryAuditSink, record_service},
    };
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn ctx(range: TimeRange, kpi: KpiFilter, quick: QuickFilter) -> DashboardContext {
        DashboardContext { now: at(16, 14), range, kpi, quick }
    }

    fn person(temp: f64, age: i64, nationality: &str, vaccinated: YesNo, encountered: YesNo) -> NewRecord {
        NewRecord {
            email: "p@x.ph".into(),
            full_name: "Test Person".into(),
            gender: Gender::Other,
            age,
            temp,
            diagnosed: YesNo::No,
            encountered,
            vaccinated,
            nationality: nationality.into(),
        }
    }

    fn plain(temp: f64) -> NewRecord {
        person(temp, 30, "Filipino", YesNo::No, YesNo::No)
    }

    fn tally(records: &[HealthRecord]) -> PeriodCounters {
        let count = |f: fn(&HealthRecord) -> bool| records.iter().filter(|r| f(r)).count() as i64;
        PeriodCounters {
            total: records.len() as i64,
            encountered: count(|r| r.encountered.is_yes()),
            vaccinated: count(|r| r.vaccinated.is_yes()),
            fever: count(|r| r.has_fever()),
            adults: count(|r| r.is_adult()),
            international: count(|r| r.is_international()),
        }
    }

    #[test]
    fn indicator_examples() {
        let up = trend_indicator(12, 10);
        assert_eq!((up.arrow, up.percentage.as_str(), up.trend), ("▲", "+20%", TrendDirection::Up));

        let down = trend_indicator(8, 10);
        assert_eq!((down.arrow, down.percentage.as_str(), down.trend), ("▼", "-20%", TrendDirection::Down));

        let fresh = trend_indicator(5, 0);
        assert_eq!((fresh.arrow, fresh.percentage.as_str(), fresh.trend), ("▲", "100%", TrendDirection::Up));

        let idle = trend_indicator(0, 0);
        assert_eq!((idle.arrow, idle.percentage.as_str(), idle.trend), ("―", "0%", TrendDirection::Neutral));

        let flat = trend_indicator(10, 10);
        assert_eq!((flat.percentage.as_str(), flat.trend), ("0%", TrendDirection::Neutral));
    }

    #[test]
    fn indicator_rounds_to_one_decimal() {
        assert_eq!(trend_indicator(1, 3).percentage, "-66.7%");
        assert_eq!(trend_indicator(4, 3).percentage, "+33.3%");
        assert_eq!(trend_indicator(0, 7).percentage, "-100%");
        assert_eq!(trend_indicator(30, 10).percentage, "+200%");
    }

    #[test]
    fn change_that_rounds_to_zero_is_neutral() {
        let tiny = trend_indicator(10001, 10000);
        assert_eq!(tiny.trend, TrendDirection::Neutral);
        assert_eq!(tiny.percentage, "0%");
        assert_eq!(tiny.arrow, "―");
    }

    #[tokio::test]
    async fn today_compares_with_yesterday() {
        let pool = test_pool().await;
        for temp in [36.5, 38.0, 37.0] {
            record_service::insert_record(&pool, &plain(temp), at(16, 9)).await.unwrap();
        }
        record_service::insert_record(&pool, &plain(38.1), at(15, 23)).await.unwrap();
        record_service::insert_record(&pool, &plain(36.1), at(14, 10)).await.unwrap();

        let audit = MemoryAuditSink::default();
        let report = calculate_trends(&pool, &ctx(TimeRange::Today, KpiFilter::None, QuickFilter::None), &audit).await;
        assert_eq!(report.current.total, 3);
        assert_eq!(report.previous.total, 1);
        assert_eq!(report.current.fever, 1);
        assert_eq!(report.previous.fever, 1);
        assert_eq!(report.trends().total.indicator.percentage, "+200%");
        assert!(audit.messages().is_empty());
    }

    #[tokio::test]
    async fn kpi_fever_is_strict_but_quick_fever_is_not() {
        let pool = test_pool().await;
        record_service::insert_record(&pool, &plain(37.5), at(16, 8)).await.unwrap();
        record_service::insert_record(&pool, &plain(38.0), at(16, 9)).await.unwrap();
        let audit = MemoryAuditSink::default();

        let report = calculate_trends(&pool, &ctx(TimeRange::Today, KpiFilter::None, QuickFilter::None), &audit).await;
        assert_eq!(report.current.fever, 1);

        let quick = ctx(TimeRange::Today, KpiFilter::None, QuickFilter::Fever);
        let filter = filter_service::build_dashboard_filter(&pool, &quick, &audit).await;
        let rows = record_service::list_records(&pool, &filter.listing, &audit).await.unwrap();
        assert_eq!(rows.len(), 2);

        let kpi = ctx(TimeRange::Today, KpiFilter::Fever, QuickFilter::None);
        let filter = filter_service::build_dashboard_filter(&pool, &kpi, &audit).await;
        let rows = record_service::list_records(&pool, &filter.listing, &audit).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temp, 38.0);
    }

    #[tokio::test]
    async fn filters_narrow_both_periods() {
        let pool = test_pool().await;
        let vaccinated = person(36.5, 40, "Filipino", YesNo::Yes, YesNo::No);
        record_service::insert_record(&pool, &vaccinated, at(16, 8)).await.unwrap();
        record_service::insert_record(&pool, &plain(36.5), at(16, 9)).await.unwrap();
        record_service::insert_record(&pool, &vaccinated, at(15, 8)).await.unwrap();
        record_service::insert_record(&pool, &vaccinated, at(15, 9)).await.unwrap();

        let audit = MemoryAuditSink::default();
        let report =
            calculate_trends(&pool, &ctx(TimeRange::Today, KpiFilter::Vaccinated, QuickFilter::None), &audit).await;
        assert_eq!(report.current.total, 1);
        assert_eq!(report.previous.total, 2);
        assert_eq!(report.current.vaccinated, report.current.total);
        assert_eq!(report.trends().total.indicator.percentage, "-50%");
    }

    #[tokio::test]
    async fn all_time_splits_records_at_the_midpoint() {
        let pool = test_pool().await;
        for ts in [at(1, 0), at(3, 0), at(6, 0), at(11, 0)] {
            record_service::insert_record(&pool, &plain(36.6), ts).await.unwrap();
        }
        let audit = MemoryAuditSink::default();
        let report = calculate_trends(&pool, &ctx(TimeRange::All, KpiFilter::None, QuickFilter::None), &audit).await;
        assert_eq!(report.current.total, 2);
        assert_eq!(report.previous.total, 2);
        assert_eq!(report.current.total + report.previous.total, 4);
    }

    #[tokio::test]
    async fn all_time_on_empty_table_is_zero_and_neutral() {
        let pool = test_pool().await;
        let audit = MemoryAuditSink::default();
        let report = calculate_trends(&pool, &ctx(TimeRange::All, KpiFilter::None, QuickFilter::None), &audit).await;
        assert_eq!(report.current, PeriodCounters::default());
        assert_eq!(report.previous, PeriodCounters::default());
        assert_eq!(report.trends().total.indicator.trend, TrendDirection::Neutral);
    }

    #[tokio::test]
    async fn sql_counters_agree_with_record_predicates() {
        let pool = test_pool().await;
        let mix = [
            person(37.5, 17, "Filipino", YesNo::Yes, YesNo::Yes),
            person(37.6, 18, "USA", YesNo::No, YesNo::Yes),
            person(36.0, 65, "philippine-born", YesNo::Yes, YesNo::No),
            person(39.0, 5, "Japanese", YesNo::No, YesNo::No),
        ];
        for record in &mix {
            record_service::insert_record(&pool, record, at(10, 10)).await.unwrap();
        }
        let query = RecordQuery::everything(true);
        let rows = record_service::list_records(&pool, &query, &MemoryAuditSink::default()).await.unwrap();
        let counters = period_counters(&pool, &query).await.unwrap();
        assert_eq!(counters, tally(&rows));
        assert_eq!(counters.international, 2);
        assert_eq!(counters.fever, 2);
        assert_eq!(counters.adults, 2);
    }

    #[tokio::test]
    async fn legacy_table_without_timestamp_degrades() {
        let pool = record_service::tests::legacy_pool().await;
        sqlx::query(
            "INSERT INTO records (email, full_name, gender, age, temp, diagnosed, encountered, vaccinated, nationality) VALUES \
             ('a@x.ph', 'Ana Cruz', 'Female', 30, 38.0, 'NO', 'YES', 'YES', 'Filipino'), \
             ('b@x.ph', 'Ben Cruz', 'Male', 12, 36.4, 'NO', 'NO', 'YES', 'Korean'), \
             ('c@x.ph', 'Cy Cruz', 'Other', 44, 36.9, 'NO', 'NO', 'NO', 'Filipino')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let audit = MemoryAuditSink::default();
        let dashboard = ctx(TimeRange::Today, KpiFilter::Vaccinated, QuickFilter::Today);
        let filter = filter_service::build_dashboard_filter(&pool, &dashboard, &audit).await;
        assert!(filter.degraded);

        let report = trend_report(&pool, &filter, &audit).await;
        assert!(report.degraded);
        assert_eq!(report.current.total, 3);
        assert_eq!(report.current.vaccinated, 2);
        assert_eq!(report.current.international, 1);
        assert_eq!(report.previous, PeriodCounters::default());
        assert_eq!(report.trends().total.indicator.percentage, "100%");

        let rows = record_service::list_records(&pool, &filter.listing, &audit).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.created_at.is_none()));
        assert!(audit.messages().is_empty());
    }

    #[tokio::test]
    async fn store_failure_yields_zeros_and_audits() {
        let pool = test_pool().await;
        record_service::insert_record(&pool, &plain(36.6), at(16, 8)).await.unwrap();
        pool.close().await;

        let audit = MemoryAuditSink::default();
        let report = calculate_trends(&pool, &ctx(TimeRange::All, KpiFilter::None, QuickFilter::None), &audit).await;
        assert_eq!(report.current, PeriodCounters::default());
        assert_eq!(report.previous, PeriodCounters::default());
        assert!(!report.degraded);

        let events = audit.messages();
        assert!(events.iter().all(|(_, severity)| *severity == Severity::Error));
        assert!(events.iter().any(|(m, _)| m.contains("current period")));
        assert!(events.iter().any(|(m, _)| m.contains("previous period")));
    }
}
