//! Duration-to-price rate card.
//!
//! Read-only from the coordinator's point of view: session creation quotes
//! from it, open-duration settlement reads the hourly rate in effect at
//! checkout time. The fallback rate lives here and nowhere else.

use crate::Result;
use chrono::Utc;
use lotkeeper_types::PricingRule;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Rate applied when the hourly label is missing from the table.
pub const DEFAULT_HOURLY_RATE: f64 = 25.0;

/// Label open-duration settlement is priced against.
pub const HOURLY_LABEL: &str = "1 Hour";

/// Committed minutes for a known-duration label. Unrecognized labels fall
/// back to one hour.
pub fn duration_minutes_for(label: &str) -> i64 {
    match label {
        "30 min" => 30,
        "1 Hour" => 60,
        "2 Hours" => 120,
        "4 Hours" => 240,
        _ => 60,
    }
}

/// SQLite-backed pricing catalog.
pub struct PricingCatalog {
    conn: Mutex<Connection>,
}

impl PricingCatalog {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let catalog = Self {
            conn: Mutex::new(conn),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pricing (
                duration_label TEXT PRIMARY KEY,
                price REAL NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Exact-label price lookup.
    pub fn get_price(&self, label: &str) -> Result<Option<f64>> {
        let conn = self.conn.lock().unwrap();
        let price = conn
            .query_row(
                "SELECT price FROM pricing WHERE duration_label = ?1",
                params![label],
                |row| row.get(0),
            )
            .optional()?;
        Ok(price)
    }

    /// Current hourly rate, falling back to [`DEFAULT_HOURLY_RATE`] when
    /// the hourly label is not configured. A missing label is non-fatal.
    pub fn hourly_rate(&self) -> Result<f64> {
        match self.get_price(HOURLY_LABEL)? {
            Some(price) => Ok(price),
            None => {
                debug!(
                    target: "lotkeeper::pricing",
                    "'{}' not configured, using fallback rate {}",
                    HOURLY_LABEL,
                    DEFAULT_HOURLY_RATE
                );
                Ok(DEFAULT_HOURLY_RATE)
            }
        }
    }

    /// All rules, cheapest first (the order the rate card is displayed in).
    pub fn list(&self) -> Result<Vec<PricingRule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT duration_label, price, updated_at FROM pricing ORDER BY price")?;
        let rules = stmt
            .query_map([], |row| {
                let updated_at: String = row.get(2)?;
                Ok(PricingRule {
                    duration_label: row.get(0)?,
                    price: row.get(1)?,
                    updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Insert or replace one rule. Used for provisioning; there is no
    /// pricing CRUD surface in the coordinator.
    pub fn upsert(&self, label: &str, price: f64) -> Result<PricingRule> {
        let updated_at = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO pricing (duration_label, price, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(duration_label) DO UPDATE SET price = ?2, updated_at = ?3
            "#,
            params![label, price, updated_at.to_rfc3339()],
        )?;
        Ok(PricingRule {
            duration_label: label.to_string(),
            price,
            updated_at,
        })
    }
}
