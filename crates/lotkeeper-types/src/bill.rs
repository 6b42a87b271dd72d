//! Finalized billing records.

use crate::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    Walkin,
    Booked,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Walkin => "walkin",
            BillType::Booked => "booked",
        }
    }
}

impl std::str::FromStr for BillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walkin" => Ok(BillType::Walkin),
            "booked" => Ok(BillType::Booked),
            other => Err(format!("invalid bill type: '{other}'")),
        }
    }
}

/// Immutable monetary record for a completed session or booking.
/// Appended once, never mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub bill_id: Uuid,
    #[serde(rename = "type")]
    pub bill_type: BillType,
    /// Session or booking id this bill settles.
    pub reference_id: Uuid,
    pub user_name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub slot_id: String,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub amount: f64,
    pub payment_method: String,
    /// Always paid at creation; bills are only cut for settled sources.
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}
