//! Activity-log rows appended alongside lifecycle transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Walkin,
    Booked,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Walkin => "walkin",
            LogType::Booked => "booked",
        }
    }
}

impl std::str::FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walkin" => Ok(LogType::Walkin),
            "booked" => Ok(LogType::Booked),
            other => Err(format!("invalid log type: '{other}'")),
        }
    }
}

/// One visit row in the daily records feed. Best-effort: appended next to
/// the lifecycle transition, not transactional with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub log_id: i64,
    pub slot_id: String,
    pub vehicle_number: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    /// Calendar date (YYYY-MM-DD) the entry was recorded under.
    pub date: String,
}
