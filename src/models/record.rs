// src/models/record.rs
use crate::error::AppError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 150;
pub const MIN_TEMP: f64 = 30.0;
pub const MAX_TEMP: f64 = 50.0;
pub const ADULT_AGE: i64 = 18;
pub const FEVER_TEMP: f64 = 37.5;
pub const HIGH_FEVER_TEMP: f64 = 38.5;

/// Lower-case fragments that mark a nationality as domestic.
pub const PHILIPPINE_VARIANTS: &[&str] = &["philippines", "philippine", "filipino", "pilipino"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }

    /// Exact match only; the form offers exactly these three values.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == raw.trim())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A YES/NO answer. Stored upper-case, accepted in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn as_str(&self) -> &'static str {
        match self {
            YesNo::Yes => "YES",
            YesNo::No => "NO",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "YES" => Some(YesNo::Yes),
            "NO" => Some(YesNo::No),
            _ => None,
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `records` row as SQLite hands it back.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub gender: String,
    pub age: i64,
    pub temp: f64,
    pub diagnosed: String,
    pub encountered: String,
    pub vaccinated: String,
    pub nationality: String,
    // NULL when the table predates the timestamp column
    pub created_at: Option<NaiveDateTime>,
}

/// A health declaration with every field inside its domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub gender: Gender,
    pub age: i64,
    pub temp: f64,
    pub diagnosed: YesNo,
    pub encountered: YesNo,
    pub vaccinated: YesNo,
    pub nationality: String,
    pub created_at: Option<NaiveDateTime>,
}

impl TryFrom<RecordRow> for HealthRecord {
    type Error = AppError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let invalid = |field: &str, value: &dyn fmt::Display| {
            AppError::InvalidRecord(format!("record {}: {} = '{}'", row.id, field, value))
        };

        let gender = Gender::parse(&row.gender).ok_or_else(|| invalid("gender", &row.gender))?;
        let diagnosed = YesNo::parse(&row.diagnosed).ok_or_else(|| invalid("diagnosed", &row.diagnosed))?;
        let encountered = YesNo::parse(&row.encountered).ok_or_else(|| invalid("encountered", &row.encountered))?;
        let vaccinated = YesNo::parse(&row.vaccinated).ok_or_else(|| invalid("vaccinated", &row.vaccinated))?;
        if !(MIN_AGE..=MAX_AGE).contains(&row.age) {
            return Err(invalid("age", &row.age));
        }
        if !(MIN_TEMP..=MAX_TEMP).contains(&row.temp) {
            return Err(invalid("temp", &row.temp));
        }

        Ok(HealthRecord {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            gender,
            age: row.age,
            temp: row.temp,
            diagnosed,
            encountered,
            vaccinated,
            nationality: row.nationality,
            created_at: row.created_at,
        })
    }
}

impl HealthRecord {
    /// Fever as counted on the KPI tiles (strictly above 37.5).
    pub fn has_fever(&self) -> bool {
        self.temp > FEVER_TEMP
    }

    pub fn is_adult(&self) -> bool {
        self.age >= ADULT_AGE
    }

    pub fn is_international(&self) -> bool {
        is_international(&self.nationality)
    }

    pub fn temp_band(&self) -> TempBand {
        TempBand::classify(self.temp)
    }
}

/// True unless the nationality mentions one of the Philippine variants.
pub fn is_international(nationality: &str) -> bool {
    let normalized = nationality.trim().to_lowercase();
    !PHILIPPINE_VARIANTS.iter().any(|v| normalized.contains(v))
}

/// Display banding of a body temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempBand {
    Normal,
    Elevated,
    High,
}

impl TempBand {
    pub fn classify(temp: f64) -> Self {
        if temp > HIGH_FEVER_TEMP {
            TempBand::High
        } else if temp >= FEVER_TEMP {
            TempBand::Elevated
        } else {
            TempBand::Normal
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            TempBand::Normal => "temp-normal",
            TempBand::Elevated => "temp-elevated",
            TempBand::High => "temp-high",
        }
    }
}

/// Validated values ready to be written to `records`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub email: String,
    pub full_name: String,
    pub gender: Gender,
    pub age: i64,
    pub temp: f64,
    pub diagnosed: YesNo,
    pub encountered: YesNo,
    pub vaccinated: YesNo,
    pub nationality: String,
}

/// Fields posted by the declaration and edit forms. Numbers arrive as text
/// so a bad value becomes a validation message instead of a 422.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclarationForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub temp: String,
    #[serde(default)]
    pub diagnosed: String,
    #[serde(default)]
    pub encounter: String,
    #[serde(default)]
    pub vaccinated: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl DeclarationForm {
    /// Prefill for the edit page.
    pub fn from_record(record: &HealthRecord) -> Self {
        Self {
            email: record.email.clone(),
            full_name: record.full_name.clone(),
            gender: record.gender.as_str().to_string(),
            age: record.age.to_string(),
            temp: record.temp.to_string(),
            diagnosed: record.diagnosed.as_str().to_string(),
            encounter: record.encountered.as_str().to_string(),
            vaccinated: record.vaccinated.as_str().to_string(),
            nationality: record.nationality.clone(),
            csrf_token: String::new(),
        }
    }

    pub fn validate(&self) -> Result<NewRecord, Vec<String>> {
        let mut errors = Vec::new();

        let email = self.email.trim().to_string();
        if !is_valid_email(&email) {
            errors.push("A valid email address is required.".to_string());
        }

        let full_name = self.full_name.trim().to_string();
        if !is_valid_person_text(&full_name) {
            errors.push("Full name must be 2-100 letters, spaces, hyphens, dots or apostrophes.".to_string());
        }

        let nationality = self.nationality.trim().to_string();
        if !is_valid_person_text(&nationality) {
            errors.push("Nationality must be 2-100 letters, spaces, hyphens, dots or apostrophes.".to_string());
        }

        let gender = Gender::parse(&self.gender);
        if gender.is_none() {
            errors.push("Gender must be Male, Female or Other.".to_string());
        }

        let age = self.age.trim().parse::<i64>().ok().filter(|a| (MIN_AGE..=MAX_AGE).contains(a));
        if age.is_none() {
            errors.push(format!("Age must be a whole number between {} and {}.", MIN_AGE, MAX_AGE));
        }

        let temp = self
            .temp
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite() && (MIN_TEMP..=MAX_TEMP).contains(t));
        if temp.is_none() {
            errors.push(format!("Temperature must be between {} and {} °C.", MIN_TEMP, MAX_TEMP));
        }

        let diagnosed = YesNo::parse(&self.diagnosed);
        if diagnosed.is_none() {
            errors.push("Answer Yes or No to the diagnosis question.".to_string());
        }
        let encountered = YesNo::parse(&self.encounter);
        if encountered.is_none() {
            errors.push("Answer Yes or No to the encounter question.".to_string());
        }
        let vaccinated = YesNo::parse(&self.vaccinated);
        if vaccinated.is_none() {
            errors.push("Answer Yes or No to the vaccination question.".to_string());
        }

        match (gender, age, temp, diagnosed, encountered, vaccinated) {
            (Some(gender), Some(age), Some(temp), Some(diagnosed), Some(encountered), Some(vaccinated))
                if errors.is_empty() =>
            {
                Ok(NewRecord {
                    email,
                    full_name,
                    gender,
                    age,
                    temp,
                    diagnosed,
                    encountered,
                    vaccinated,
                    nationality,
                })
            }
            _ => Err(errors),
        }
    }

    pub fn is_gender(&self, gender: &str) -> bool {
        self.gender == gender
    }

    pub fn answer_is(&self, field: &str, answer: &str) -> bool {
        let value = match field {
            "diagnosed" => &self.diagnosed,
            "encounter" => &self.encounter,
            "vaccinated" => &self.vaccinated,
            _ => return false,
        };
        value.eq_ignore_ascii_case(answer)
    }
}

/// Shape check only: one '@', non-empty local part, dotted domain, no spaces.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains("..")
        }
        None => false,
    }
}

/// Names and nationalities: 2-100 chars of ASCII letters, spaces, `-`, `.`, `'`.
pub fn is_valid_person_text(value: &str) -> bool {
    (2..=100).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '-' || c == '.' || c == '\'')
}
