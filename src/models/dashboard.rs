// src/models/dashboard.rs
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

/// Primary time bucket of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TimeRange {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "7days")]
    SevenDays,
    #[serde(rename = "30days")]
    ThirtyDays,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::Today,
        TimeRange::SevenDays,
        TimeRange::ThirtyDays,
        TimeRange::All,
    ];

    /// Total: anything unrecognised falls back to `All`.
    pub fn from_param(raw: &str) -> Self {
        match raw.trim() {
            "today" => TimeRange::Today,
            "7days" => TimeRange::SevenDays,
            "30days" => TimeRange::ThirtyDays,
            _ => TimeRange::All,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            TimeRange::Today => "today",
            TimeRange::SevenDays => "7days",
            TimeRange::ThirtyDays => "30days",
            TimeRange::All => "all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Today => "Today",
            TimeRange::SevenDays => "Last 7 Days",
            TimeRange::ThirtyDays => "Last 30 Days",
            TimeRange::All => "All Time",
        }
    }

    pub fn comparison_label(&self) -> &'static str {
        match self {
            TimeRange::Today => "vs yesterday",
            TimeRange::SevenDays => "vs previous 7 days",
            TimeRange::ThirtyDays => "vs previous 30 days",
            TimeRange::All => "vs first half",
        }
    }
}

/// Attribute filter selected from a KPI tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiFilter {
    #[default]
    #[serde(rename = "")]
    None,
    Encountered,
    Vaccinated,
    Fever,
    Adults,
    International,
}

impl KpiFilter {
    /// Unknown values mean "no filter", never an error.
    pub fn from_param(raw: &str) -> Self {
        match raw.trim() {
            "encountered" => KpiFilter::Encountered,
            "vaccinated" => KpiFilter::Vaccinated,
            "fever" => KpiFilter::Fever,
            "adults" => KpiFilter::Adults,
            "international" => KpiFilter::International,
            _ => KpiFilter::None,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            KpiFilter::None => "",
            KpiFilter::Encountered => "encountered",
            KpiFilter::Vaccinated => "vaccinated",
            KpiFilter::Fever => "fever",
            KpiFilter::Adults => "adults",
            KpiFilter::International => "international",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KpiFilter::None => "",
            KpiFilter::Encountered => "COVID-19 Encounters",
            KpiFilter::Vaccinated => "Vaccinated",
            KpiFilter::Fever => "Fever Cases",
            KpiFilter::Adults => "Adults",
            KpiFilter::International => "International",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, KpiFilter::None)
    }
}

/// Second, independently toggled filter layered on top of the KPI filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickFilter {
    #[default]
    #[serde(rename = "")]
    None,
    Vaccinated,
    Encountered,
    Fever,
    Today,
}

impl QuickFilter {
    pub fn from_param(raw: &str) -> Self {
        match raw.trim() {
            "vaccinated" => QuickFilter::Vaccinated,
            "encountered" => QuickFilter::Encountered,
            "fever" => QuickFilter::Fever,
            "today" => QuickFilter::Today,
            _ => QuickFilter::None,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            QuickFilter::None => "",
            QuickFilter::Vaccinated => "vaccinated",
            QuickFilter::Encountered => "encountered",
            QuickFilter::Fever => "fever",
            QuickFilter::Today => "today",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuickFilter::None => "",
            QuickFilter::Vaccinated => "Vaccinated",
            QuickFilter::Encountered => "Encountered",
            QuickFilter::Fever => "Fever (≥ 37.5 °C)",
            QuickFilter::Today => "Submitted Today",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, QuickFilter::None)
    }
}

/// Everything the filter builder and trend calculator need from one request.
/// `now` is captured once so all windows agree with each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardContext {
    pub now: NaiveDateTime,
    pub range: TimeRange,
    pub kpi: KpiFilter,
    pub quick: QuickFilter,
}

/// The six dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kpi {
    Total,
    Encountered,
    Vaccinated,
    Fever,
    Adults,
    International,
}

impl Kpi {
    pub const ALL: [Kpi; 6] = [
        Kpi::Total,
        Kpi::Encountered,
        Kpi::Vaccinated,
        Kpi::Fever,
        Kpi::Adults,
        Kpi::International,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Kpi::Total => "total",
            Kpi::Encountered => "encountered",
            Kpi::Vaccinated => "vaccinated",
            Kpi::Fever => "fever",
            Kpi::Adults => "adults",
            Kpi::International => "international",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Kpi::Total => "Total Declarations",
            Kpi::Encountered => "COVID-19 Encounters",
            Kpi::Vaccinated => "Vaccinated",
            Kpi::Fever => "Fever Cases",
            Kpi::Adults => "Adults",
            Kpi::International => "International",
        }
    }

    /// The KPI filter a tile links to; the total tile clears it.
    pub fn filter(&self) -> KpiFilter {
        match self {
            Kpi::Total => KpiFilter::None,
            Kpi::Encountered => KpiFilter::Encountered,
            Kpi::Vaccinated => KpiFilter::Vaccinated,
            Kpi::Fever => KpiFilter::Fever,
            Kpi::Adults => KpiFilter::Adults,
            Kpi::International => KpiFilter::International,
        }
    }
}

/// Counters for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct PeriodCounters {
    pub total: i64,
    pub encountered: i64,
    pub vaccinated: i64,
    pub fever: i64,
    pub adults: i64,
    pub international: i64,
}

impl PeriodCounters {
    pub fn get(&self, kpi: Kpi) -> i64 {
        match kpi {
            Kpi::Total => self.total,
            Kpi::Encountered => self.encountered,
            Kpi::Vaccinated => self.vaccinated,
            Kpi::Fever => self.fever,
            Kpi::Adults => self.adults,
            Kpi::International => self.international,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

impl TrendDirection {
    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::Up => "▲",
            TrendDirection::Down => "▼",
            TrendDirection::Neutral => "―",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Neutral => "neutral",
        }
    }
}

/// Arrow / percentage / direction triple for one counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendIndicator {
    pub arrow: &'static str,
    pub percentage: String,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiTrend {
    pub current: i64,
    pub previous: i64,
    #[serde(flatten)]
    pub indicator: TrendIndicator,
}

/// Trend per KPI, keyed by KPI name when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiTrends {
    pub total: KpiTrend,
    pub encountered: KpiTrend,
    pub vaccinated: KpiTrend,
    pub fever: KpiTrend,
    pub adults: KpiTrend,
    pub international: KpiTrend,
}

impl KpiTrends {
    pub fn get(&self, kpi: Kpi) -> &KpiTrend {
        match kpi {
            Kpi::Total => &self.total,
            Kpi::Encountered => &self.encountered,
            Kpi::Vaccinated => &self.vaccinated,
            Kpi::Fever => &self.fever,
            Kpi::Adults => &self.adults,
            Kpi::International => &self.international,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_range_defaults_to_all() {
        assert_eq!(TimeRange::from_param("yesterday"), TimeRange::All);
        assert_eq!(TimeRange::from_param(""), TimeRange::All);
        assert_eq!(TimeRange::from_param("7days"), TimeRange::SevenDays);
    }

    #[test]
    fn range_params_round_trip() {
        for range in TimeRange::ALL {
            assert_eq!(TimeRange::from_param(range.as_param()), range);
        }
    }

    #[test]
    fn unknown_filters_are_empty() {
        assert_eq!(KpiFilter::from_param("xyz"), KpiFilter::None);
        assert_eq!(KpiFilter::from_param("xyz"), KpiFilter::from_param(""));
        assert_eq!(QuickFilter::from_param("adults"), QuickFilter::None);
        assert_eq!(QuickFilter::from_param("today"), QuickFilter::Today);
    }

    #[test]
    fn filters_serialize_as_their_param() {
        for kpi in [KpiFilter::None, KpiFilter::Fever, KpiFilter::International] {
            assert_eq!(serde_json::to_value(kpi).unwrap(), kpi.as_param());
        }
        for quick in [QuickFilter::None, QuickFilter::Today, QuickFilter::Vaccinated] {
            assert_eq!(serde_json::to_value(quick).unwrap(), quick.as_param());
        }
    }

    #[test]
    fn tiles_link_to_their_filter() {
        assert_eq!(Kpi::Total.filter(), KpiFilter::None);
        for kpi in &Kpi::ALL[1..] {
            assert_eq!(KpiFilter::from_param(kpi.key()), kpi.filter());
        }
    }

    #[test]
    fn trend_serializes_flat() {
        let trend = KpiTrend {
            current: 12,
            previous: 10,
            indicator: TrendIndicator {
                arrow: TrendDirection::Up.arrow(),
                percentage: "+20%".into(),
                trend: TrendDirection::Up,
            },
        };
        let json = serde_json::to_value(&trend).unwrap();
        assert_eq!(json["arrow"], "▲");
        assert_eq!(json["trend"], "up");
        assert_eq!(json["current"], 12);
    }
}
