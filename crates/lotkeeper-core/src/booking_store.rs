//! SQLite persistence for app bookings.

use crate::{LotError, Result};
use chrono::Utc;
use lotkeeper_types::{Booking, BookingStatus, PaymentStatus};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// Optional list filters (admin bookings table).
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub slot_id: Option<String>,
}

pub struct BookingStore {
    conn: Mutex<Connection>,
}

impl BookingStore {
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
            CREATE TABLE IF NOT EXISTS bookings (
                booking_id TEXT PRIMARY KEY,
                qr_token TEXT NOT NULL UNIQUE,
                user_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                vehicle_number TEXT NOT NULL,
                vehicle_type TEXT NOT NULL,
                slot_id TEXT NOT NULL,
                arrival_time TEXT,
                duration_label TEXT,
                amount REAL NOT NULL DEFAULT 0.0,
                payment_status TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
            CREATE INDEX IF NOT EXISTS idx_bookings_slot ON bookings(slot_id);
            "#,
        )?;
        Ok(())
    }

    /// Insert a new booking.
    pub fn insert(&self, booking: &Booking) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO bookings (
                booking_id, qr_token, user_name, phone, vehicle_number,
                vehicle_type, slot_id, arrival_time, duration_label, amount,
                payment_status, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                booking.booking_id.to_string(),
                booking.qr_token.to_string(),
                booking.user_name,
                booking.phone,
                booking.vehicle_number,
                booking.vehicle_type,
                booking.slot_id,
                booking.arrival_time.map(|t| t.to_rfc3339()),
                booking.duration_label,
                booking.amount,
                booking.payment_status.as_str(),
                booking.status.as_str(),
                booking.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a booking by ID.
    pub fn get(&self, id: Uuid) -> Result<Option<Booking>> {
        let conn = self.conn.lock().unwrap();
        let booking = conn
            .query_row(
                "SELECT * FROM bookings WHERE booking_id = ?1",
                params![id.to_string()],
                Self::row_to_booking,
            )
            .optional()?;
        Ok(booking)
    }

    /// Exact-match arrival check-in lookup. No throttling or token expiry
    /// at this layer; callers needing that add it externally.
    pub fn verify_by_qr_token(&self, token: &str) -> Result<Option<Booking>> {
        let conn = self.conn.lock().unwrap();
        let booking = conn
            .query_row(
                "SELECT * FROM bookings WHERE qr_token = ?1",
                params![token.trim()],
                Self::row_to_booking,
            )
            .optional()?;
        Ok(booking)
    }

    /// List bookings, newest first, optionally filtered.
    pub fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from("SELECT * FROM bookings WHERE 1=1");
        let mut args: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            args.push(status.as_str().to_string());
            sql.push_str(&format!(" AND status = ?{}", args.len()));
        }
        if let Some(ref slot_id) = filter.slot_id {
            args.push(slot_id.clone());
            sql.push_str(&format!(" AND slot_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let bookings = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_booking)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    /// Bookings still holding a reservation (pending or confirmed). Used
    /// to rebuild slot flags at startup.
    pub fn list_live(&self) -> Result<Vec<Booking>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM bookings WHERE status IN ('pending', 'confirmed') ORDER BY created_at",
        )?;
        let bookings = stmt
            .query_map([], Self::row_to_booking)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    /// Move a booking along the status graph. The update is conditioned on
    /// the observed current status, so a concurrent transition loses
    /// cleanly instead of double-applying.
    pub fn update_status(&self, id: Uuid, new_status: BookingStatus) -> Result<Booking> {
        let current = self
            .get(id)?
            .ok_or_else(|| LotError::BookingNotFound(id.to_string()))?;

        if !current.status.can_transition(new_status) {
            return Err(LotError::InvalidBookingTransition {
                from: current.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        let updated = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE bookings SET status = ?1 WHERE booking_id = ?2 AND status = ?3",
                params![
                    new_status.as_str(),
                    id.to_string(),
                    current.status.as_str()
                ],
            )?
        };
        if updated == 0 {
            // Lost a race: someone else transitioned the booking first.
            let actual = self
                .get(id)?
                .map(|b| b.status.as_str().to_string())
                .unwrap_or_else(|| "missing".to_string());
            return Err(LotError::InvalidBookingTransition {
                from: actual,
                to: new_status.as_str().to_string(),
            });
        }

        self.get(id)?
            .ok_or_else(|| LotError::BookingNotFound(id.to_string()))
    }

    /// The confirmed → completed edge, as a single check-and-set.
    pub fn complete(&self, id: Uuid) -> Result<Booking> {
        self.update_status(id, BookingStatus::Completed)
    }

    fn row_to_booking(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
        let booking_id: String = row.get("booking_id")?;
        let qr_token: String = row.get("qr_token")?;
        let arrival_time: Option<String> = row.get("arrival_time")?;
        let payment_status: String = row.get("payment_status")?;
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;

        Ok(Booking {
            booking_id: Uuid::parse_str(&booking_id).unwrap_or_default(),
            qr_token: Uuid::parse_str(&qr_token).unwrap_or_default(),
            user_name: row.get("user_name")?,
            phone: row.get("phone")?,
            vehicle_number: row.get("vehicle_number")?,
            vehicle_type: row.get("vehicle_type")?,
            slot_id: row.get("slot_id")?,
            arrival_time: arrival_time.and_then(|t| {
                chrono::DateTime::parse_from_rfc3339(&t)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            duration_label: row.get("duration_label")?,
            amount: row.get("amount")?,
            payment_status: payment_status.parse().unwrap_or(PaymentStatus::Pending),
            status: status.parse().unwrap_or(BookingStatus::Pending),
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
        })
    }
}
