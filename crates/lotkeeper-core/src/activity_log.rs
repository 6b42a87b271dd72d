//! Best-effort activity log.
//!
//! One row per visit, appended at start and stamped at end. Appends sit
//! outside the lifecycle transaction: a failed append is logged and the
//! transition proceeds.

use crate::Result;
use chrono::{DateTime, Utc};
use lotkeeper_types::{ActivityLogEntry, LogType};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

pub struct ActivityLog {
    conn: Mutex<Connection>,
}

impl ActivityLog {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.init_schema()?;
        Ok(log)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS parking_logs (
                log_id INTEGER PRIMARY KEY AUTOINCREMENT,
                slot_id TEXT NOT NULL,
                vehicle_number TEXT NOT NULL,
                type TEXT NOT NULL,
                entry_time TEXT NOT NULL,
                exit_time TEXT,
                duration_minutes INTEGER,
                date TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_logs_date ON parking_logs(date);
            CREATE INDEX IF NOT EXISTS idx_logs_open ON parking_logs(slot_id, exit_time);
            "#,
        )?;
        Ok(())
    }

    /// Append an entry row at visit start.
    pub fn append_entry(
        &self,
        slot_id: &str,
        vehicle_number: &str,
        log_type: LogType,
        entry_time: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO parking_logs (slot_id, vehicle_number, type, entry_time, date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                slot_id,
                vehicle_number,
                log_type.as_str(),
                entry_time.to_rfc3339(),
                entry_time.format("%Y-%m-%d").to_string(),
            ],
        )?;
        Ok(())
    }

    /// Stamp the newest open row of the matching type at visit end. Scoped
    /// to one row so a stale open entry of the other type on the same slot
    /// is never closed with this visit's times.
    pub fn close_open(
        &self,
        slot_id: &str,
        log_type: LogType,
        exit_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE parking_logs SET exit_time = ?1, duration_minutes = ?2
            WHERE log_id = (
                SELECT log_id FROM parking_logs
                WHERE slot_id = ?3 AND type = ?4 AND exit_time IS NULL
                ORDER BY entry_time DESC LIMIT 1
            )
            "#,
            params![
                exit_time.to_rfc3339(),
                duration_minutes,
                slot_id,
                log_type.as_str()
            ],
        )?;
        Ok(())
    }

    /// Rows recorded under a calendar date (YYYY-MM-DD), earliest first.
    pub fn list_for_date(&self, date: &str) -> Result<Vec<ActivityLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM parking_logs WHERE date = ?1 ORDER BY entry_time")?;
        let entries = stmt
            .query_map(params![date], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<ActivityLogEntry> {
        let log_type: String = row.get("type")?;
        let entry_time: String = row.get("entry_time")?;
        let exit_time: Option<String> = row.get("exit_time")?;

        Ok(ActivityLogEntry {
            log_id: row.get("log_id")?,
            slot_id: row.get("slot_id")?,
            vehicle_number: row.get("vehicle_number")?,
            log_type: log_type.parse().unwrap_or(LogType::Walkin),
            entry_time: chrono::DateTime::parse_from_rfc3339(&entry_time)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            exit_time: exit_time.and_then(|t| {
                chrono::DateTime::parse_from_rfc3339(&t)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            duration_minutes: row.get("duration_minutes")?,
            date: row.get("date")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn entry_is_closed_once() {
        let dir = tempdir().unwrap();
        let log = ActivityLog::open(&dir.path().join("lot.db")).unwrap();

        let entry = Utc::now();
        log.append_entry("A1", "TN01AB1234", LogType::Walkin, entry)
            .unwrap();
        log.close_open("A1", LogType::Walkin, Utc::now(), 42).unwrap();

        let date = entry.format("%Y-%m-%d").to_string();
        let rows = log.list_for_date(&date).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].duration_minutes, Some(42));
        assert!(rows[0].exit_time.is_some());
    }

    #[test]
    fn close_only_touches_the_matching_type() {
        let dir = tempdir().unwrap();
        let log = ActivityLog::open(&dir.path().join("lot.db")).unwrap();

        // A stale open reservation row sits on the slot when a later
        // walk-in starts and ends.
        let stale = Utc::now() - chrono::Duration::hours(3);
        log.append_entry("A1", "KA05MN4321", LogType::Booked, stale)
            .unwrap();
        log.append_entry("A1", "TN01AB1234", LogType::Walkin, Utc::now())
            .unwrap();
        log.close_open("A1", LogType::Walkin, Utc::now(), 30).unwrap();

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let rows = log.list_for_date(&date).unwrap();
        let walkin = rows
            .iter()
            .find(|r| r.log_type == LogType::Walkin)
            .unwrap();
        assert_eq!(walkin.duration_minutes, Some(30));
        assert!(walkin.exit_time.is_some());

        // The booked row keeps its open state untouched.
        let stale_date = stale.format("%Y-%m-%d").to_string();
        let booked: Vec<_> = log
            .list_for_date(&stale_date)
            .unwrap()
            .into_iter()
            .chain(rows.into_iter())
            .filter(|r| r.log_type == LogType::Booked)
            .collect();
        assert!(booked.iter().all(|r| r.exit_time.is_none()));
    }
}
