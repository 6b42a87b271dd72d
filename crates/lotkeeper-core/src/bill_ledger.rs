//! Append-only billing ledger.
//!
//! Rows are inserted once and never updated or deleted. The coordinator's
//! completion-gated creation path keeps duplicates out of the normal flow;
//! the unique `(type, reference_id)` index is the backstop that makes the
//! at-most-one-bill rule hold under concurrent retries.

use crate::{LotError, Result};
use chrono::Utc;
use lotkeeper_types::{Bill, BillType, PaymentStatus};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

pub struct BillLedger {
    conn: Mutex<Connection>,
}

impl BillLedger {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bills (
                bill_id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                reference_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                vehicle_number TEXT NOT NULL,
                vehicle_type TEXT NOT NULL,
                slot_id TEXT NOT NULL,
                entry_time TEXT,
                exit_time TEXT NOT NULL,
                duration_minutes INTEGER,
                amount REAL NOT NULL,
                payment_method TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_reference ON bills(type, reference_id);
            "#,
        )?;
        Ok(())
    }

    /// Append a finalized bill. A second bill for the same
    /// `(type, reference_id)` pair trips the unique index and fails with
    /// `DuplicateBill`, so concurrent retries settle to exactly one row.
    pub fn append(&self, bill: &Bill) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO bills (
                bill_id, type, reference_id, user_name, phone, vehicle_number,
                vehicle_type, slot_id, entry_time, exit_time, duration_minutes,
                amount, payment_method, payment_status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                bill.bill_id.to_string(),
                bill.bill_type.as_str(),
                bill.reference_id.to_string(),
                bill.user_name,
                bill.phone,
                bill.vehicle_number,
                bill.vehicle_type,
                bill.slot_id,
                bill.entry_time.map(|t| t.to_rfc3339()),
                bill.exit_time.to_rfc3339(),
                bill.duration_minutes,
                bill.amount,
                bill.payment_method,
                bill.payment_status.as_str(),
                bill.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                LotError::DuplicateBill(bill.reference_id)
            }
            other => LotError::Database(other),
        })?;
        Ok(())
    }

    /// Get a bill by ID.
    pub fn get(&self, id: Uuid) -> Result<Option<Bill>> {
        let conn = self.conn.lock().unwrap();
        let bill = conn
            .query_row(
                "SELECT * FROM bills WHERE bill_id = ?1",
                params![id.to_string()],
                Self::row_to_bill,
            )
            .optional()?;
        Ok(bill)
    }

    /// The bill settling a given session or booking, if one exists.
    pub fn find_by_reference(&self, bill_type: BillType, reference_id: Uuid) -> Result<Option<Bill>> {
        let conn = self.conn.lock().unwrap();
        let bill = conn
            .query_row(
                "SELECT * FROM bills WHERE type = ?1 AND reference_id = ?2",
                params![bill_type.as_str(), reference_id.to_string()],
                Self::row_to_bill,
            )
            .optional()?;
        Ok(bill)
    }

    /// All bills, newest first.
    pub fn list(&self) -> Result<Vec<Bill>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM bills ORDER BY created_at DESC")?;
        let bills = stmt
            .query_map([], Self::row_to_bill)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bills)
    }

    fn row_to_bill(row: &rusqlite::Row) -> rusqlite::Result<Bill> {
        let bill_id: String = row.get("bill_id")?;
        let bill_type: String = row.get("type")?;
        let reference_id: String = row.get("reference_id")?;
        let entry_time: Option<String> = row.get("entry_time")?;
        let exit_time: String = row.get("exit_time")?;
        let payment_status: String = row.get("payment_status")?;
        let created_at: String = row.get("created_at")?;

        Ok(Bill {
            bill_id: Uuid::parse_str(&bill_id).unwrap_or_default(),
            bill_type: bill_type.parse().unwrap_or(BillType::Walkin),
            reference_id: Uuid::parse_str(&reference_id).unwrap_or_default(),
            user_name: row.get("user_name")?,
            phone: row.get("phone")?,
            vehicle_number: row.get("vehicle_number")?,
            vehicle_type: row.get("vehicle_type")?,
            slot_id: row.get("slot_id")?,
            entry_time: entry_time.and_then(|t| {
                chrono::DateTime::parse_from_rfc3339(&t)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            exit_time: chrono::DateTime::parse_from_rfc3339(&exit_time)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            duration_minutes: row.get("duration_minutes")?,
            amount: row.get("amount")?,
            payment_method: row.get("payment_method")?,
            payment_status: payment_status.parse().unwrap_or(PaymentStatus::Paid),
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_find_by_reference() {
        let dir = tempdir().unwrap();
        let ledger = BillLedger::open(&dir.path().join("lot.db")).unwrap();

        let reference_id = Uuid::new_v4();
        let bill = Bill {
            bill_id: Uuid::new_v4(),
            bill_type: BillType::Walkin,
            reference_id,
            user_name: "Asha".into(),
            phone: "9876543210".into(),
            vehicle_number: "TN01AB1234".into(),
            vehicle_type: "Car".into(),
            slot_id: "A3".into(),
            entry_time: Some(Utc::now()),
            exit_time: Utc::now(),
            duration_minutes: Some(30),
            amount: 45.0,
            payment_method: "Cash".into(),
            payment_status: PaymentStatus::Paid,
            created_at: Utc::now(),
        };
        ledger.append(&bill).unwrap();

        let found = ledger
            .find_by_reference(BillType::Walkin, reference_id)
            .unwrap()
            .unwrap();
        assert_eq!(found.bill_id, bill.bill_id);
        assert_eq!(found.amount, 45.0);

        // Same reference under the other type is a different pair.
        assert!(ledger
            .find_by_reference(BillType::Booked, reference_id)
            .unwrap()
            .is_none());
        assert_eq!(ledger.list().unwrap().len(), 1);
    }

    #[test]
    fn second_bill_for_same_reference_is_rejected() {
        let dir = tempdir().unwrap();
        let ledger = BillLedger::open(&dir.path().join("lot.db")).unwrap();

        let reference_id = Uuid::new_v4();
        let mut bill = Bill {
            bill_id: Uuid::new_v4(),
            bill_type: BillType::Booked,
            reference_id,
            user_name: "Ravi".into(),
            phone: "9123456780".into(),
            vehicle_number: "KA05MN4321".into(),
            vehicle_type: "Car".into(),
            slot_id: "B1".into(),
            entry_time: None,
            exit_time: Utc::now(),
            duration_minutes: None,
            amount: 45.0,
            payment_method: "paid".into(),
            payment_status: PaymentStatus::Paid,
            created_at: Utc::now(),
        };
        ledger.append(&bill).unwrap();

        // A retry with a fresh bill id but the same reference must lose.
        bill.bill_id = Uuid::new_v4();
        let err = ledger.append(&bill).unwrap_err();
        assert!(matches!(err, LotError::DuplicateBill(id) if id == reference_id));
        assert_eq!(ledger.list().unwrap().len(), 1);

        // The walkin pair for the same reference is still free.
        bill.bill_id = Uuid::new_v4();
        bill.bill_type = BillType::Walkin;
        ledger.append(&bill).unwrap();
        assert_eq!(ledger.list().unwrap().len(), 2);
    }
}
