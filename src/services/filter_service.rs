// src/services/filter_service.rs
//! Turns the dashboard request context into store queries: the current and
//! comparison periods over `created_at`, plus the KPI and quick-filter
//! predicates over the record's attribute columns.

use crate::{
    models::{
        dashboard::{DashboardContext, KpiFilter, QuickFilter, TimeRange},
        record::{HealthRecord, YesNo, ADULT_AGE, FEVER_TEMP, PHILIPPINE_VARIANTS},
    },
    services::{
        audit_service::{AuditSink, Severity},
        record_service,
    },
};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub const TIMESTAMP_COLUMN: &str = "created_at";

/// Half-open interval `[start, end)` over `created_at`; a missing bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub const UNBOUNDED: TimeWindow = TimeWindow { start: None, end: None };

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start: Some(start), end: Some(end) }
    }

    pub fn since(start: NaiveDateTime) -> Self {
        Self { start: Some(start), end: None }
    }

    pub fn before(end: NaiveDateTime) -> Self {
        Self { start: None, end: Some(end) }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts < e)
    }

    fn push_sql(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(start) = self.start {
            qb.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = self.end {
            qb.push(" AND created_at < ").push_bind(end);
        }
    }
}

/// One attribute (or calendar) condition on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Encountered,
    Vaccinated,
    /// KPI fever rule: strictly above the threshold.
    TempAbove(f64),
    /// Quick-filter fever rule: threshold included.
    TempAtLeast(f64),
    MinAge(i64),
    International,
    CreatedWithin(TimeWindow),
}

impl Predicate {
    fn needs_timestamp(&self) -> bool {
        matches!(self, Predicate::CreatedWithin(_))
    }

    fn push_sql(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Predicate::Encountered => {
                qb.push(" AND encountered = ").push_bind(YesNo::Yes.as_str());
            }
            Predicate::Vaccinated => {
                qb.push(" AND vaccinated = ").push_bind(YesNo::Yes.as_str());
            }
            Predicate::TempAbove(t) => {
                qb.push(" AND temp > ").push_bind(*t);
            }
            Predicate::TempAtLeast(t) => {
                qb.push(" AND temp >= ").push_bind(*t);
            }
            Predicate::MinAge(age) => {
                qb.push(" AND age >= ").push_bind(*age);
            }
            Predicate::International => {
                for variant in PHILIPPINE_VARIANTS {
                    qb.push(" AND LOWER(TRIM(nationality)) NOT LIKE ")
                        .push_bind(format!("%{}%", variant));
                }
            }
            Predicate::CreatedWithin(window) => window.push_sql(qb),
        }
    }

    /// In-memory evaluation, kept in step with `push_sql`.
    pub fn matches(&self, record: &HealthRecord) -> bool {
        match self {
            Predicate::Encountered => record.encountered.is_yes(),
            Predicate::Vaccinated => record.vaccinated.is_yes(),
            Predicate::TempAbove(t) => record.temp > *t,
            Predicate::TempAtLeast(t) => record.temp >= *t,
            Predicate::MinAge(age) => record.age >= *age,
            Predicate::International => record.is_international(),
            Predicate::CreatedWithin(window) => record.created_at.is_some_and(|ts| window.contains(ts)),
        }
    }
}

/// A complete filter over `records`: a time window plus attribute predicates, all ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub window: TimeWindow,
    pub predicates: Vec<Predicate>,
    /// False when the table has no `created_at`; time conditions are then dropped.
    pub timestamped: bool,
}

impl RecordQuery {
    pub fn everything(timestamped: bool) -> Self {
        Self { window: TimeWindow::UNBOUNDED, predicates: Vec::new(), timestamped }
    }

    pub fn new(window: TimeWindow, predicates: Vec<Predicate>) -> Self {
        Self { window, predicates, timestamped: true }
    }

    /// Copy of this query for a table without the timestamp column.
    pub fn without_timestamp(&self) -> Self {
        Self {
            window: TimeWindow::UNBOUNDED,
            predicates: self.predicates.iter().filter(|p| !p.needs_timestamp()).cloned().collect(),
            timestamped: false,
        }
    }

    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if self.timestamped {
            self.window.push_sql(qb);
        }
        for predicate in &self.predicates {
            if self.timestamped || !predicate.needs_timestamp() {
                predicate.push_sql(qb);
            }
        }
    }

    pub fn matches(&self, record: &HealthRecord) -> bool {
        let in_window = !self.timestamped
            || self.window.is_unbounded()
            || record.created_at.is_some_and(|ts| self.window.contains(ts));
        in_window
            && self
                .predicates
                .iter()
                .filter(|p| self.timestamped || !p.needs_timestamp())
                .all(|p| p.matches(record))
    }
}

fn start_of_day(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(NaiveTime::MIN)
}

/// Calendar day containing `now`.
pub fn today_window(now: NaiveDateTime) -> TimeWindow {
    let start = start_of_day(now);
    TimeWindow::between(start, start + Duration::days(1))
}

/// Current and comparison windows for a range. The comparison window always
/// ends exactly where the current one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindows {
    pub current: TimeWindow,
    pub previous: TimeWindow,
}

/// `bounds` is `(min, max)` of `created_at` over all records; only `All` uses it.
pub fn period_windows(
    range: TimeRange,
    now: NaiveDateTime,
    bounds: Option<(NaiveDateTime, NaiveDateTime)>,
) -> PeriodWindows {
    match range {
        TimeRange::Today => {
            let today = today_window(now);
            let start = start_of_day(now);
            PeriodWindows {
                current: today,
                previous: TimeWindow::between(start - Duration::days(1), start),
            }
        }
        TimeRange::SevenDays => rolling_windows(now, Duration::days(7)),
        TimeRange::ThirtyDays => rolling_windows(now, Duration::days(30)),
        TimeRange::All => match bounds {
            Some((min, max)) => {
                let midpoint = min + (max - min) / 2;
                PeriodWindows {
                    current: TimeWindow::since(midpoint),
                    previous: TimeWindow::before(midpoint),
                }
            }
            None => PeriodWindows { current: TimeWindow::UNBOUNDED, previous: TimeWindow::UNBOUNDED },
        },
    }
}

fn rolling_windows(now: NaiveDateTime, length: Duration) -> PeriodWindows {
    let boundary = now - length;
    PeriodWindows {
        current: TimeWindow::since(boundary),
        previous: TimeWindow::between(boundary - length, boundary),
    }
}

/// Predicates for the KPI and quick filters. Both may be active; they are ANDed.
pub fn attribute_predicates(kpi: KpiFilter, quick: QuickFilter, now: NaiveDateTime) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    match kpi {
        KpiFilter::None => {}
        KpiFilter::Encountered => predicates.push(Predicate::Encountered),
        KpiFilter::Vaccinated => predicates.push(Predicate::Vaccinated),
        KpiFilter::Fever => predicates.push(Predicate::TempAbove(FEVER_TEMP)),
        KpiFilter::Adults => predicates.push(Predicate::MinAge(ADULT_AGE)),
        KpiFilter::International => predicates.push(Predicate::International),
    }
    match quick {
        QuickFilter::None => {}
        QuickFilter::Vaccinated => predicates.push(Predicate::Vaccinated),
        QuickFilter::Encountered => predicates.push(Predicate::Encountered),
        QuickFilter::Fever => predicates.push(Predicate::TempAtLeast(FEVER_TEMP)),
        QuickFilter::Today => predicates.push(Predicate::CreatedWithin(today_window(now))),
    }
    predicates
}

/// Queries for one dashboard render.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardFilter {
    /// Row listing: current period + KPI + quick.
    pub listing: RecordQuery,
    pub current: RecordQuery,
    /// `None` in degraded mode: there is nothing to compare against.
    pub previous: Option<RecordQuery>,
    pub degraded: bool,
}

/// Pure part of the builder, given what the store reported.
pub fn compose_filter(
    ctx: &DashboardContext,
    has_timestamp: bool,
    bounds: Option<(NaiveDateTime, NaiveDateTime)>,
) -> DashboardFilter {
    let predicates = attribute_predicates(ctx.kpi, ctx.quick, ctx.now);

    if !has_timestamp {
        let listing = RecordQuery::new(TimeWindow::UNBOUNDED, predicates).without_timestamp();
        return DashboardFilter {
            listing,
            current: RecordQuery::everything(false),
            previous: None,
            degraded: true,
        };
    }

    let windows = period_windows(ctx.range, ctx.now, bounds);
    let current = RecordQuery::new(windows.current, predicates.clone());
    DashboardFilter {
        listing: current.clone(),
        current,
        previous: Some(RecordQuery::new(windows.previous, predicates)),
        degraded: false,
    }
}

/// Asks the store about its schema (and, for `All`, the timestamp bounds), then
/// composes the queries. Store failures are audited and degrade; they never abort.
pub async fn build_dashboard_filter(
    db_pool: &SqlitePool,
    ctx: &DashboardContext,
    audit: &dyn AuditSink,
) -> DashboardFilter {
    let has_timestamp = match record_service::has_column(db_pool, TIMESTAMP_COLUMN).await {
        Ok(exists) => exists,
        Err(e) => {
            audit.record(&format!("Schema check for {} failed: {}", TIMESTAMP_COLUMN, e), Severity::Error);
            true
        }
    };
    if !has_timestamp {
        tracing::warn!("records.{} is missing, dashboard runs in degraded mode", TIMESTAMP_COLUMN);
    }

    let bounds = if has_timestamp && ctx.range == TimeRange::All {
        match record_service::created_at_bounds(db_pool).await {
            Ok(bounds) => bounds,
            Err(e) => {
                audit.record(&format!("Timestamp bounds query failed: {}", e), Severity::Error);
                None
            }
        }
    } else {
        None
    };

    let filter = compose_filter(ctx, has_timestamp, bounds);
    tracing::debug!(
        "Dashboard filter: range={} kpi={:?} quick={:?} degraded={}",
        ctx.range.as_param(),
        ctx.kpi,
        ctx.quick,
        filter.degraded
    );
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn ctx(range: TimeRange, kpi: KpiFilter, quick: QuickFilter) -> DashboardContext {
        DashboardContext { now: at(16, 14, 30), range, kpi, quick }
    }

    #[test]
    fn bounded_ranges_are_contiguous_and_disjoint() {
        let now = at(16, 14, 30);
        for range in [TimeRange::Today, TimeRange::SevenDays, TimeRange::ThirtyDays] {
            let w = period_windows(range, now, None);
            assert_eq!(w.previous.end, w.current.start, "{:?} leaves a gap", range);
            let boundary = w.current.start.unwrap();
            assert!(w.current.contains(boundary));
            assert!(!w.previous.contains(boundary));
            let just_before = boundary - Duration::seconds(1);
            assert!(w.previous.contains(just_before));
            assert!(!w.current.contains(just_before));
        }
    }

    #[test]
    fn today_compares_with_yesterday() {
        let w = period_windows(TimeRange::Today, at(16, 14, 30), None);
        assert_eq!(w.current, TimeWindow::between(at(16, 0, 0), at(17, 0, 0)));
        assert_eq!(w.previous, TimeWindow::between(at(15, 0, 0), at(16, 0, 0)));
    }

    #[test]
    fn seven_days_is_rolling_from_now() {
        let w = period_windows(TimeRange::SevenDays, at(16, 14, 30), None);
        assert_eq!(w.current, TimeWindow::since(at(9, 14, 30)));
        assert_eq!(w.previous, TimeWindow::between(at(2, 14, 30), at(9, 14, 30)));
    }

    #[test]
    fn thirty_days_reaches_back_sixty() {
        let now = at(16, 14, 30);
        let w = period_windows(TimeRange::ThirtyDays, now, None);
        assert_eq!(w.previous.start, Some(now - Duration::days(60)));
        assert_eq!(w.previous.end, Some(now - Duration::days(30)));
    }

    #[test]
    fn all_splits_at_the_midpoint_exactly_once() {
        let bounds = (at(1, 0, 0), at(11, 0, 0));
        let w = period_windows(TimeRange::All, at(16, 14, 30), Some(bounds));
        assert_eq!(w.current, TimeWindow::since(at(6, 0, 0)));
        assert_eq!(w.previous, TimeWindow::before(at(6, 0, 0)));

        let mut ts = bounds.0;
        while ts <= bounds.1 {
            assert!(w.current.contains(ts) ^ w.previous.contains(ts));
            ts += Duration::hours(7);
        }
    }

    #[test]
    fn all_without_records_is_unbounded() {
        let w = period_windows(TimeRange::All, at(16, 14, 30), None);
        assert!(w.current.is_unbounded());
        assert!(w.previous.is_unbounded());
    }

    #[test]
    fn fever_thresholds_differ_between_kpi_and_quick() {
        let now = at(16, 14, 30);
        assert_eq!(
            attribute_predicates(KpiFilter::Fever, QuickFilter::None, now),
            vec![Predicate::TempAbove(37.5)]
        );
        assert_eq!(
            attribute_predicates(KpiFilter::None, QuickFilter::Fever, now),
            vec![Predicate::TempAtLeast(37.5)]
        );
    }

    #[test]
    fn kpi_and_quick_are_combined() {
        let predicates = attribute_predicates(KpiFilter::Adults, QuickFilter::Vaccinated, at(16, 1, 0));
        assert_eq!(predicates, vec![Predicate::MinAge(18), Predicate::Vaccinated]);
    }

    #[test]
    fn unknown_kpi_builds_the_same_filter_as_empty() {
        let unknown = ctx(TimeRange::SevenDays, KpiFilter::from_param("xyz"), QuickFilter::None);
        let empty = ctx(TimeRange::SevenDays, KpiFilter::from_param(""), QuickFilter::None);
        assert_eq!(compose_filter(&unknown, true, None), compose_filter(&empty, true, None));
    }

    #[test]
    fn filters_apply_to_both_periods() {
        let filter = compose_filter(&ctx(TimeRange::Today, KpiFilter::International, QuickFilter::Fever), true, None);
        let previous = filter.previous.expect("comparison period");
        assert_eq!(filter.current.predicates, previous.predicates);
        assert_eq!(filter.listing, filter.current);
    }

    #[test]
    fn degraded_mode_drops_time_conditions() {
        let filter = compose_filter(&ctx(TimeRange::Today, KpiFilter::Vaccinated, QuickFilter::Today), false, None);
        assert!(filter.degraded);
        assert!(filter.previous.is_none());
        assert_eq!(filter.current, RecordQuery::everything(false));
        assert_eq!(filter.listing.predicates, vec![Predicate::Vaccinated]);
        assert!(filter.listing.window.is_unbounded());
    }

    #[test]
    fn where_clause_is_parameterized() {
        let query = RecordQuery::new(
            TimeWindow::since(at(9, 0, 0)),
            vec![Predicate::International, Predicate::TempAbove(37.5)],
        );
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM records");
        query.push_where(&mut qb);
        let sql = qb.sql().to_string();
        assert!(sql.contains("created_at >= ?"));
        assert!(sql.contains("temp > ?"));
        assert_eq!(sql.matches("NOT LIKE ?").count(), PHILIPPINE_VARIANTS.len());
        assert!(!sql.contains("philippine"));
    }
}
