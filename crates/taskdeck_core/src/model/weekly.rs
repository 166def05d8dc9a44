//! Weekly planning records keyed by ISO week.
//!
//! # Invariants
//! - `weekKey` has the form `YYYY-Www` (ISO-8601 week date).
//! - `weekStart` is the Monday of that week as `YYYY-MM-DD`.

use super::Record;
use crate::schema::{WEEKLY_ITEMS, WEEKLY_PLANS};
use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WEEK_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-W(0[1-9]|[1-4]\d|5[0-3])$").expect("valid week key regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekDay {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }
}

impl From<Weekday> for WeekDay {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    pub week_key: String,
    pub week_start: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Record for WeeklyPlan {
    const COLLECTION: &'static str = WEEKLY_PLANS;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyItem {
    pub id: String,
    pub week_key: String,
    pub entity_id: String,
    pub day: WeekDay,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Record for WeeklyItem {
    const COLLECTION: &'static str = WEEKLY_ITEMS;
}

/// Returns the ISO week key containing `date`.
pub fn week_key_for(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Parses a week key into the Monday that starts it.
///
/// Returns `None` for malformed keys and for week 53 in years without one.
pub fn week_start_for(week_key: &str) -> Option<NaiveDate> {
    let captures = WEEK_KEY_RE.captures(week_key)?;
    let year: i32 = captures.get(1)?.as_str().parse().ok()?;
    let week: u32 = captures.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
}

#[cfg(test)]
mod tests {
    use super::{week_key_for, week_start_for};
    use chrono::NaiveDate;

    #[test]
    fn week_key_uses_iso_year_at_boundaries() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        assert_eq!(week_key_for(date), "2025-W01");
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(week_key_for(date), "2026-W43");
    }

    #[test]
    fn week_start_round_trips_and_rejects_malformed_keys() {
        let monday = week_start_for("2025-W01").unwrap();
        assert_eq!(monday, NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());
        assert_eq!(week_key_for(monday), "2025-W01");

        assert!(week_start_for("2025-W00").is_none());
        assert!(week_start_for("2025-1").is_none());
        assert!(week_start_for("2025-W53").is_none());
        assert!(week_start_for("2026-W53").is_some());
    }
}
