// src/models/guest.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

/// Row of the per-IP guest counter.
#[derive(Debug, Clone, FromRow)]
pub struct GuestUsage {
    pub ip_address: String,
    pub usage_count: i64,
    pub usage_date: NaiveDate,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_reset: Option<NaiveDateTime>,
}

impl GuestUsage {
    /// Usage that counts against today's limit; a row from another day counts as zero.
    pub fn usage_on(&self, today: NaiveDate) -> i64 {
        if self.usage_date == today {
            self.usage_count
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    LimitReached,
    LastSubmission,
    LowUsage,
    NormalUsage,
}

impl UsageStatus {
    pub fn from_remaining(remaining: i64) -> Self {
        match remaining {
            r if r <= 0 => UsageStatus::LimitReached,
            1 => UsageStatus::LastSubmission,
            2 => UsageStatus::LowUsage,
            _ => UsageStatus::NormalUsage,
        }
    }
}

/// Whether the current visitor may submit another declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Eligibility {
    /// Signed-in staff: no daily limit.
    Unlimited,
    Guest { remaining: i64, limit: i64, status: UsageStatus },
}

impl Eligibility {
    pub fn allowed(&self) -> bool {
        match self {
            Eligibility::Unlimited => true,
            Eligibility::Guest { remaining, .. } => *remaining > 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Eligibility::Unlimited => "Signed in - unlimited submissions".to_string(),
            Eligibility::Guest { remaining, .. } if *remaining > 0 => {
                format!("You have {} submission(s) remaining today", remaining)
            }
            Eligibility::Guest { .. } => {
                "Daily limit reached. Please sign up for unlimited access.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_by_remaining() {
        assert_eq!(UsageStatus::from_remaining(0), UsageStatus::LimitReached);
        assert_eq!(UsageStatus::from_remaining(-2), UsageStatus::LimitReached);
        assert_eq!(UsageStatus::from_remaining(1), UsageStatus::LastSubmission);
        assert_eq!(UsageStatus::from_remaining(2), UsageStatus::LowUsage);
        assert_eq!(UsageStatus::from_remaining(3), UsageStatus::NormalUsage);
    }

    #[test]
    fn exhausted_guest_is_not_allowed() {
        let e = Eligibility::Guest { remaining: 0, limit: 3, status: UsageStatus::LimitReached };
        assert!(!e.allowed());
        assert!(e.message().contains("limit reached"));
        assert!(Eligibility::Unlimited.allowed());
    }
}
