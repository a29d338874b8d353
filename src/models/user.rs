// src/models/user.rs
use chrono::NaiveDateTime;
use serde::Deserialize;
use sqlx::FromRow;

// A staff account from the 'users' table
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    // username or email
    #[serde(rename = "mailuid")]
    pub login: String,
    #[serde(rename = "pwd")]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_repeat: String,
    #[serde(default)]
    pub csrf_token: String,
}

pub const MIN_PASSWORD_LEN: usize = 6;

impl SignupForm {
    /// Field-level checks; uniqueness is checked against the store afterwards.
    pub fn validate(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        let username = self.username.trim();
        if username.is_empty() || self.email.trim().is_empty() || self.password.is_empty() {
            errors.push("Fill in all fields.");
            return errors;
        }
        if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push("Username may only contain letters and digits.");
        }
        if !crate::models::record::is_valid_email(self.email.trim()) {
            errors.push("Enter a valid email address.");
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            errors.push("Password must be at least 6 characters.");
        }
        if self.password != self.password_repeat {
            errors.push("Passwords do not match.");
        }
        errors
    }
}
