//! Duration-to-price rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the rate card, keyed by its duration label ("1 Hour").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub duration_label: String,
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}
