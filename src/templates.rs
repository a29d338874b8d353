// src/templates.rs
use crate::models::record::{DeclarationForm, HealthRecord};
use crate::web::flash::Flash;
use askama::Template;
use chrono::NaiveDateTime;

pub const DISPLAY_DATETIME: &str = "%b %d, %Y %H:%M";

pub fn display_datetime(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format(DISPLAY_DATETIME).to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub error: Option<String>,
    pub success: Option<String>,
    // echoes the username/email back after a failed attempt
    pub login: String,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupPage {
    pub errors: Vec<String>,
    pub username: String,
    pub email: String,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "declaration_form.html")]
pub struct DeclarationPage {
    pub form: DeclarationForm,
    pub errors: Vec<String>,
    pub csrf_token: String,
    pub signed_in: bool,
    pub allowed: bool,
    pub quota_message: String,
    pub quota_class: &'static str,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "edit_record.html")]
pub struct EditRecordPage {
    pub record_id: i64,
    pub form: DeclarationForm,
    pub errors: Vec<String>,
    pub csrf_token: String,
}

/// One KPI tile on the dashboard.
pub struct KpiTile {
    pub label: &'static str,
    pub current: i64,
    pub previous: i64,
    pub arrow: &'static str,
    pub percentage: String,
    pub trend: &'static str,
    pub href: String,
    pub active: bool,
}

/// A link in the range or quick-filter bar.
pub struct NavLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

/// Listing row with its display-only derivations.
pub struct RecordView {
    pub record: HealthRecord,
    pub temp_class: &'static str,
    pub submitted: String,
}

impl From<HealthRecord> for RecordView {
    fn from(record: HealthRecord) -> Self {
        RecordView {
            temp_class: record.temp_band().css_class(),
            submitted: display_datetime(record.created_at),
            record,
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage {
    pub username: String,
    pub csrf_token: String,
    pub range_label: &'static str,
    pub comparison_label: &'static str,
    pub ranges: Vec<NavLink>,
    pub quick_links: Vec<NavLink>,
    pub tiles: Vec<KpiTile>,
    pub active_filters: Vec<&'static str>,
    pub clear_href: String,
    pub rows: Vec<RecordView>,
    pub degraded: bool,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub username: String,
    pub email: String,
    pub member_since: String,
    pub submissions: i64,
    pub first_submission: String,
    pub last_submission: String,
    pub rows: Vec<RecordView>,
    pub csrf_token: String,
}
