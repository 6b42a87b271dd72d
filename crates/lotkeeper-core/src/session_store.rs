//! SQLite persistence for walk-in sessions.

use crate::{LotError, Result};
use chrono::{DateTime, Utc};
use lotkeeper_types::{DurationType, PaymentStatus, WalkInSession};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// Walk-in session records. One row per physical visit; rows are ended,
/// never deleted (the compensating rollback in session start is the one
/// exception).
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS walk_in_sessions (
                session_id TEXT PRIMARY KEY,
                user_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                vehicle_number TEXT NOT NULL,
                vehicle_type TEXT NOT NULL,
                slot_id TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                duration_type TEXT NOT NULL,
                duration_minutes INTEGER,
                duration_label TEXT,
                amount REAL NOT NULL DEFAULT 0.0,
                payment_status TEXT NOT NULL,
                bill_generated INTEGER NOT NULL DEFAULT 0,
                entry_time TEXT NOT NULL,
                exit_time TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_slot ON walk_in_sessions(slot_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_active ON walk_in_sessions(exit_time);
            "#,
        )?;
        Ok(())
    }

    /// Insert a new session.
    pub fn insert(&self, session: &WalkInSession) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO walk_in_sessions (
                session_id, user_name, phone, vehicle_number, vehicle_type,
                slot_id, payment_method, duration_type, duration_minutes,
                duration_label, amount, payment_status, bill_generated,
                entry_time, exit_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                session.session_id.to_string(),
                session.user_name,
                session.phone,
                session.vehicle_number,
                session.vehicle_type,
                session.slot_id,
                session.payment_method,
                session.duration_type.as_str(),
                session.duration_minutes,
                session.duration_label,
                session.amount,
                session.payment_status.as_str(),
                session.bill_generated as i64,
                session.entry_time.to_rfc3339(),
                session.exit_time.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get a session by ID.
    pub fn get(&self, id: Uuid) -> Result<Option<WalkInSession>> {
        let conn = self.conn.lock().unwrap();
        let session = conn
            .query_row(
                "SELECT * FROM walk_in_sessions WHERE session_id = ?1",
                params![id.to_string()],
                Self::row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Active sessions (no exit time), earliest entry first.
    pub fn list_active(&self) -> Result<Vec<WalkInSession>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM walk_in_sessions WHERE exit_time IS NULL ORDER BY entry_time",
        )?;
        let sessions = stmt
            .query_map([], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// All sessions, most recent entry first.
    pub fn list_all(&self) -> Result<Vec<WalkInSession>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM walk_in_sessions ORDER BY entry_time DESC")?;
        let sessions = stmt
            .query_map([], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// The active session on a slot, if any. At most one exists.
    pub fn active_for_slot(&self, slot_id: &str) -> Result<Option<WalkInSession>> {
        let conn = self.conn.lock().unwrap();
        let session = conn
            .query_row(
                "SELECT * FROM walk_in_sessions WHERE slot_id = ?1 AND exit_time IS NULL",
                params![slot_id],
                Self::row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Settle a session: stamp exit, duration and final amount, mark paid.
    ///
    /// The update is guarded by `exit_time IS NULL` as a single
    /// check-and-set, so a second end on the same session always fails with
    /// `SessionNotActive` instead of silently re-releasing the slot.
    pub fn end(
        &self,
        id: Uuid,
        exit_time: DateTime<Utc>,
        duration_minutes: i64,
        final_amount: f64,
    ) -> Result<WalkInSession> {
        let updated = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                r#"
                UPDATE walk_in_sessions SET
                    exit_time = ?1,
                    duration_minutes = ?2,
                    amount = ?3,
                    payment_status = 'paid'
                WHERE session_id = ?4 AND exit_time IS NULL
                "#,
                params![
                    exit_time.to_rfc3339(),
                    duration_minutes,
                    final_amount,
                    id.to_string()
                ],
            )?
        };

        if updated == 0 {
            return match self.get(id)? {
                Some(_) => Err(LotError::SessionNotActive(id)),
                None => Err(LotError::SessionNotFound(id)),
            };
        }
        self.get(id)?.ok_or(LotError::SessionNotFound(id))
    }

    /// Set the billed flag. Guarded by `bill_generated = 0` so concurrent
    /// retries produce exactly one bill.
    pub fn mark_billed(&self, id: Uuid) -> Result<()> {
        let updated = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE walk_in_sessions SET bill_generated = 1 WHERE session_id = ?1 AND bill_generated = 0",
                params![id.to_string()],
            )?
        };

        if updated == 0 {
            return match self.get(id)? {
                Some(_) => Err(LotError::DuplicateBill(id)),
                None => Err(LotError::SessionNotFound(id)),
            };
        }
        Ok(())
    }

    /// Undo `mark_billed` after a failed ledger append so billing can be
    /// retried.
    pub fn clear_billed(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE walk_in_sessions SET bill_generated = 0 WHERE session_id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    /// Remove a just-inserted session whose slot marking failed. Only used
    /// as a compensating action inside session start.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM walk_in_sessions WHERE session_id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<WalkInSession> {
        let session_id: String = row.get("session_id")?;
        let duration_type: String = row.get("duration_type")?;
        let payment_status: String = row.get("payment_status")?;
        let entry_time: String = row.get("entry_time")?;
        let exit_time: Option<String> = row.get("exit_time")?;

        Ok(WalkInSession {
            session_id: Uuid::parse_str(&session_id).unwrap_or_default(),
            user_name: row.get("user_name")?,
            phone: row.get("phone")?,
            vehicle_number: row.get("vehicle_number")?,
            vehicle_type: row.get("vehicle_type")?,
            slot_id: row.get("slot_id")?,
            payment_method: row.get("payment_method")?,
            duration_type: duration_type.parse().unwrap_or(DurationType::Open),
            duration_minutes: row.get("duration_minutes")?,
            duration_label: row.get("duration_label")?,
            amount: row.get("amount")?,
            payment_status: payment_status.parse().unwrap_or(PaymentStatus::Pending),
            bill_generated: row.get::<_, i64>("bill_generated")? != 0,
            entry_time: chrono::DateTime::parse_from_rfc3339(&entry_time)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            exit_time: exit_time.and_then(|t| {
                chrono::DateTime::parse_from_rfc3339(&t)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(&dir.path().join("lot.db")).unwrap();
        (dir, store)
    }

    fn session(slot_id: &str) -> WalkInSession {
        WalkInSession {
            session_id: Uuid::new_v4(),
            user_name: "Asha".into(),
            phone: "9876543210".into(),
            vehicle_number: "TN01AB1234".into(),
            vehicle_type: "Car".into(),
            slot_id: slot_id.into(),
            payment_method: "Cash".into(),
            duration_type: DurationType::Open,
            duration_minutes: None,
            duration_label: None,
            amount: 0.0,
            payment_status: PaymentStatus::Pending,
            bill_generated: false,
            entry_time: Utc::now(),
            exit_time: None,
        }
    }

    #[test]
    fn insert_and_round_trip() {
        let (_dir, store) = store();
        let s = session("A1");
        store.insert(&s).unwrap();

        let loaded = store.get(s.session_id).unwrap().unwrap();
        assert_eq!(loaded.slot_id, "A1");
        assert!(loaded.is_active());
        assert_eq!(loaded.payment_status, PaymentStatus::Pending);
        assert_eq!(store.active_for_slot("A1").unwrap().unwrap().session_id, s.session_id);
    }

    #[test]
    fn double_end_fails() {
        let (_dir, store) = store();
        let s = session("A1");
        store.insert(&s).unwrap();

        let ended = store.end(s.session_id, Utc::now(), 30, 45.0).unwrap();
        assert_eq!(ended.payment_status, PaymentStatus::Paid);
        assert_eq!(ended.duration_minutes, Some(30));
        assert_eq!(ended.amount, 45.0);

        let err = store.end(s.session_id, Utc::now(), 31, 45.0).unwrap_err();
        assert!(matches!(err, LotError::SessionNotActive(id) if id == s.session_id));
    }

    #[test]
    fn mark_billed_is_check_and_set() {
        let (_dir, store) = store();
        let s = session("A2");
        store.insert(&s).unwrap();

        store.mark_billed(s.session_id).unwrap();
        let err = store.mark_billed(s.session_id).unwrap_err();
        assert!(matches!(err, LotError::DuplicateBill(id) if id == s.session_id));

        store.clear_billed(s.session_id).unwrap();
        store.mark_billed(s.session_id).unwrap();
    }

    #[test]
    fn unknown_session_errors() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.end(id, Utc::now(), 1, 0.0).unwrap_err(),
            LotError::SessionNotFound(_)
        ));
        assert!(matches!(
            store.mark_billed(id).unwrap_err(),
            LotError::SessionNotFound(_)
        ));
    }
}
