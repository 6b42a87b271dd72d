//! Walk-in session types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the visit is billed: a pre-committed duration quoted up front, or
/// open-ended and settled on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationType {
    Known,
    Open,
}

impl DurationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationType::Known => "known",
            DurationType::Open => "open",
        }
    }
}

impl std::str::FromStr for DurationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "known" => Ok(DurationType::Known),
            "open" => Ok(DurationType::Open),
            other => Err(format!("invalid duration type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("invalid payment status: '{other}'")),
        }
    }
}

/// One physical parking visit started by an attendant.
///
/// Historical record: created on start, mutated once on end, never deleted.
/// `exit_time == None` means the session is active; at most one active
/// session exists per slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkInSession {
    pub session_id: Uuid,
    pub user_name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub slot_id: String,
    pub payment_method: String,
    pub duration_type: DurationType,
    /// Minutes committed up front (known) or measured on exit (open).
    pub duration_minutes: Option<i64>,
    /// Pricing label the quote was taken from, for known durations.
    pub duration_label: Option<String>,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub bill_generated: bool,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
}

impl WalkInSession {
    pub fn is_active(&self) -> bool {
        self.exit_time.is_none()
    }
}
