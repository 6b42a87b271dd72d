//! Lifecycle coordinator orchestrating registry, stores and fan-out.
//!
//! All writers (attendant UIs, booking flows, hardware ingestion) enter
//! here. Operations targeting the same slot are serialized on a per-slot
//! lock; operations on different slots proceed independently. Pricing
//! reads happen before the lock is taken: the critical section is
//! read-then-decide over the registry plus one fail-fast store mutation.

use crate::{
    duration_minutes_for, ActivityLog, BillLedger, BookingFilter, BookingStore, ChangeBus,
    LotError, PricingCatalog, Result, SessionStore, SlotRegistry, SLOTS_TOPIC,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lotkeeper_types::{
    ActivityLogEntry, Bill, BillType, Booking, BookingStatus, DurationType, LogType,
    PaymentStatus, PricingRule, Slot, SlotChangeEvent, SlotPatch, TransitionCause, WalkInSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub db_path: PathBuf,
    /// Slot ids provisioned for this lot.
    pub slot_ids: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_local_dir()
                .unwrap_or_default()
                .join("lotkeeper")
                .join("lot.db"),
            slot_ids: ["A1", "A2", "A3", "A4", "A5", "A6"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Attendant walk-in entry.
#[derive(Debug, Clone)]
pub struct StartSessionRequest {
    pub user_name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub slot_id: String,
    pub payment_method: String,
    pub duration_type: DurationType,
    /// Pricing label for known durations; ignored for open.
    pub duration_label: Option<String>,
}

/// App-originated reservation.
#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub user_name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub slot_id: String,
    pub arrival_time: Option<DateTime<Utc>>,
    pub duration_label: Option<String>,
    pub payment_status: PaymentStatus,
}

pub struct LifecycleCoordinator {
    registry: SlotRegistry,
    sessions: SessionStore,
    bookings: BookingStore,
    bills: BillLedger,
    pricing: PricingCatalog,
    logs: ActivityLog,
    bus: Arc<ChangeBus>,
    slot_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LifecycleCoordinator {
    /// Open every store on the shared database, seed the registry from the
    /// configured slot ids and rebuild slot flags from surviving records.
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let bus = Arc::new(ChangeBus::new());
        let coordinator = Self {
            registry: SlotRegistry::new(&config.slot_ids, bus.clone()),
            sessions: SessionStore::open(&config.db_path)?,
            bookings: BookingStore::open(&config.db_path)?,
            bills: BillLedger::open(&config.db_path)?,
            pricing: PricingCatalog::open(&config.db_path)?,
            logs: ActivityLog::open(&config.db_path)?,
            bus,
            slot_locks: DashMap::new(),
        };
        coordinator.rehydrate()?;
        Ok(coordinator)
    }

    /// Rebuild occupancy and reservation flags after a restart from the
    /// sessions and bookings that were live when the process stopped.
    fn rehydrate(&self) -> Result<()> {
        for session in self.sessions.list_active()? {
            match self.registry.apply_transition(
                &session.slot_id,
                SlotPatch::occupy(session.vehicle_number.clone()),
                TransitionCause::Rehydrate,
            ) {
                Ok(_) => info!(
                    target: "lotkeeper::coordinator",
                    slot_id = %session.slot_id,
                    session_id = %session.session_id,
                    "rehydrated active walk-in session"
                ),
                Err(e) => warn!(
                    target: "lotkeeper::coordinator",
                    slot_id = %session.slot_id,
                    "active session references unprovisioned slot: {e}"
                ),
            }
        }

        for booking in self.bookings.list_live()? {
            if let Err(e) = self.registry.apply_transition(
                &booking.slot_id,
                SlotPatch::book(booking.user_name.clone()),
                TransitionCause::Rehydrate,
            ) {
                warn!(
                    target: "lotkeeper::coordinator",
                    slot_id = %booking.slot_id,
                    "live booking references unprovisioned slot: {e}"
                );
            }
        }
        Ok(())
    }

    fn slot_lock(&self, slot_id: &str) -> Arc<Mutex<()>> {
        self.slot_locks
            .entry(slot_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ── Walk-in sessions ──────────────────────────────────────────────

    /// Start a walk-in session on an available slot, marking it occupied.
    pub async fn start_session(&self, req: StartSessionRequest) -> Result<WalkInSession> {
        // Quote before taking the slot lock; pricing is slot-independent.
        let (duration_minutes, duration_label, amount) = match req.duration_type {
            DurationType::Known => {
                let label = req
                    .duration_label
                    .unwrap_or_else(|| crate::HOURLY_LABEL.to_string());
                let amount = self.pricing.get_price(&label)?.unwrap_or(0.0);
                (Some(duration_minutes_for(&label)), Some(label), amount)
            }
            // Settled on exit at the rate in effect at checkout.
            DurationType::Open => (None, None, 0.0),
        };

        let lock = self.slot_lock(&req.slot_id);
        let _guard = lock.lock().await;

        let slot = self
            .registry
            .get(&req.slot_id)
            .ok_or_else(|| LotError::UnknownSlot(req.slot_id.clone()))?;
        if !slot.is_available() {
            return Err(LotError::SlotUnavailable(req.slot_id.clone()));
        }

        let vehicle_number = req.vehicle_number.to_uppercase();
        let session = WalkInSession {
            session_id: Uuid::new_v4(),
            user_name: req.user_name,
            phone: req.phone,
            vehicle_number: vehicle_number.clone(),
            vehicle_type: req.vehicle_type,
            slot_id: req.slot_id.clone(),
            payment_method: req.payment_method,
            duration_type: req.duration_type,
            duration_minutes,
            duration_label,
            amount,
            payment_status: PaymentStatus::Pending,
            bill_generated: false,
            entry_time: Utc::now(),
            exit_time: None,
        };
        self.sessions.insert(&session)?;

        if let Err(e) = self.registry.apply_transition(
            &req.slot_id,
            SlotPatch::occupy(vehicle_number.clone()),
            TransitionCause::WalkInStart,
        ) {
            // Roll the record back: no active session may exist on a slot
            // that still looks available.
            if let Err(del) = self.sessions.delete(session.session_id) {
                error!(
                    target: "lotkeeper::coordinator",
                    session_id = %session.session_id,
                    "failed to roll back session after slot marking failure: {del}"
                );
            }
            return Err(e);
        }

        if let Err(e) = self.logs.append_entry(
            &session.slot_id,
            &vehicle_number,
            LogType::Walkin,
            session.entry_time,
        ) {
            warn!(target: "lotkeeper::coordinator", "activity log append failed: {e}");
        }

        info!(
            target: "lotkeeper::coordinator",
            session_id = %session.session_id,
            slot_id = %session.slot_id,
            amount = session.amount,
            "walk-in session started"
        );
        Ok(session)
    }

    /// End an active walk-in session and release its slot.
    ///
    /// `final_amount` overrides the computed settlement; when absent, open
    /// sessions are settled at the current hourly rate and known sessions
    /// keep their quoted amount. Ending twice fails with `SessionNotActive`
    /// and leaves the slot untouched.
    pub async fn end_session(
        &self,
        session_id: Uuid,
        final_amount: Option<f64>,
    ) -> Result<WalkInSession> {
        let session = self
            .sessions
            .get(session_id)?
            .ok_or(LotError::SessionNotFound(session_id))?;

        let now = Utc::now();
        let elapsed_secs = (now - session.entry_time).num_seconds().max(0);
        let duration_minutes = (elapsed_secs + 59) / 60;

        let amount = match final_amount {
            Some(amount) => amount,
            None => match session.duration_type {
                DurationType::Open => self.quote_open_amount(duration_minutes)?,
                DurationType::Known => session.amount,
            },
        };

        let lock = self.slot_lock(&session.slot_id);
        let _guard = lock.lock().await;

        // Conditional update: fails before any slot mutation if the
        // session was already ended.
        let ended = self.sessions.end(session_id, now, duration_minutes, amount)?;
        self.registry.apply_transition(
            &session.slot_id,
            SlotPatch::release_occupancy(),
            TransitionCause::WalkInEnd,
        )?;

        if let Err(e) = self
            .logs
            .close_open(&session.slot_id, LogType::Walkin, now, duration_minutes)
        {
            warn!(target: "lotkeeper::coordinator", "activity log close failed: {e}");
        }

        info!(
            target: "lotkeeper::coordinator",
            session_id = %session_id,
            slot_id = %session.slot_id,
            duration_minutes,
            amount,
            "walk-in session ended"
        );
        Ok(ended)
    }

    /// Open-duration settlement: whole hours (rounded up) at the hourly
    /// rate in effect now, not at check-in.
    pub fn quote_open_amount(&self, elapsed_minutes: i64) -> Result<f64> {
        let hourly_rate = self.pricing.hourly_rate()?;
        let hours = (elapsed_minutes.max(0) + 59) / 60;
        Ok(hours as f64 * hourly_rate)
    }

    // ── Bookings ──────────────────────────────────────────────────────

    /// Create a pending booking, reserving the slot logically.
    pub async fn create_booking(&self, req: CreateBookingRequest) -> Result<Booking> {
        let amount = match req.duration_label.as_deref() {
            Some(label) => self.pricing.get_price(label)?.unwrap_or(0.0),
            None => 0.0,
        };

        let lock = self.slot_lock(&req.slot_id);
        let _guard = lock.lock().await;

        let slot = self
            .registry
            .get(&req.slot_id)
            .ok_or_else(|| LotError::UnknownSlot(req.slot_id.clone()))?;
        if !slot.is_available() {
            return Err(LotError::SlotUnavailable(req.slot_id.clone()));
        }

        let booking = Booking {
            booking_id: Uuid::new_v4(),
            qr_token: Uuid::new_v4(),
            user_name: req.user_name,
            phone: req.phone,
            vehicle_number: req.vehicle_number.to_uppercase(),
            vehicle_type: req.vehicle_type,
            slot_id: req.slot_id.clone(),
            arrival_time: req.arrival_time,
            duration_label: req.duration_label,
            amount,
            payment_status: req.payment_status,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        };
        self.bookings.insert(&booking)?;

        if let Err(e) = self.registry.apply_transition(
            &req.slot_id,
            SlotPatch::book(booking.user_name.clone()),
            TransitionCause::BookingCreated,
        ) {
            // Records are never deleted; a booking whose reservation could
            // not be taken is cancelled instead.
            if let Err(cancel) = self
                .bookings
                .update_status(booking.booking_id, BookingStatus::Cancelled)
            {
                error!(
                    target: "lotkeeper::coordinator",
                    booking_id = %booking.booking_id,
                    "failed to cancel booking after slot marking failure: {cancel}"
                );
            }
            return Err(e);
        }

        if let Err(e) = self.logs.append_entry(
            &booking.slot_id,
            &booking.vehicle_number,
            LogType::Booked,
            booking.created_at,
        ) {
            warn!(target: "lotkeeper::coordinator", "activity log append failed: {e}");
        }

        info!(
            target: "lotkeeper::coordinator",
            booking_id = %booking.booking_id,
            slot_id = %booking.slot_id,
            "booking created"
        );
        Ok(booking)
    }

    /// Graph-validated status move. Confirming has no slot side effects;
    /// cancelling releases the reservation when the cancelled booking is
    /// the slot's live holder.
    pub async fn update_booking_status(
        &self,
        booking_id: Uuid,
        new_status: BookingStatus,
    ) -> Result<Booking> {
        if new_status == BookingStatus::Cancelled {
            return self.cancel_booking(booking_id).await;
        }

        let booking = self.bookings.update_status(booking_id, new_status)?;
        info!(
            target: "lotkeeper::coordinator",
            booking_id = %booking_id,
            status = new_status.as_str(),
            "booking status updated"
        );
        Ok(booking)
    }

    /// Cancel a pending or confirmed booking and drop its reservation so
    /// the slot does not stay flagged `booked` with no live booking behind
    /// it. Physical occupancy is left alone.
    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self
            .bookings
            .get(booking_id)?
            .ok_or_else(|| LotError::BookingNotFound(booking_id.to_string()))?;

        let lock = self.slot_lock(&booking.slot_id);
        let _guard = lock.lock().await;

        let cancelled = self.bookings.update_status(booking_id, BookingStatus::Cancelled)?;

        // Only release if this booking still holds the reservation; an
        // overridden or re-booked slot is left as-is.
        let holds_reservation = self
            .registry
            .get(&booking.slot_id)
            .is_some_and(|slot| {
                slot.booked && slot.booked_by.as_deref() == Some(booking.user_name.as_str())
            });
        if holds_reservation {
            self.registry.apply_transition(
                &booking.slot_id,
                SlotPatch::release_booking(),
                TransitionCause::BookingCancelled,
            )?;
        }

        info!(
            target: "lotkeeper::coordinator",
            booking_id = %booking_id,
            slot_id = %booking.slot_id,
            released = holds_reservation,
            "booking cancelled"
        );
        Ok(cancelled)
    }

    /// Complete a confirmed booking and fully release its slot as one
    /// transition under the slot lock.
    pub async fn end_booking(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self
            .bookings
            .get(booking_id)?
            .ok_or_else(|| LotError::BookingNotFound(booking_id.to_string()))?;

        let lock = self.slot_lock(&booking.slot_id);
        let _guard = lock.lock().await;

        // Validate the slot first so the booking is never marked completed
        // with its reservation impossible to release.
        if !self.registry.contains(&booking.slot_id) {
            return Err(LotError::UnknownSlot(booking.slot_id.clone()));
        }

        let completed = self.bookings.complete(booking_id)?;
        self.registry.apply_transition(
            &booking.slot_id,
            SlotPatch::clear_all(),
            TransitionCause::BookingEnd,
        )?;

        let now = Utc::now();
        let duration_minutes = booking
            .arrival_time
            .map(|arrival| ((now - arrival).num_seconds().max(0) + 59) / 60)
            .unwrap_or(0);
        if let Err(e) = self
            .logs
            .close_open(&booking.slot_id, LogType::Booked, now, duration_minutes)
        {
            warn!(target: "lotkeeper::coordinator", "activity log close failed: {e}");
        }

        info!(
            target: "lotkeeper::coordinator",
            booking_id = %booking_id,
            slot_id = %booking.slot_id,
            "booking session ended"
        );
        Ok(completed)
    }

    /// Arrival check-in lookup by QR token.
    pub fn verify_booking(&self, token: &str) -> Result<Booking> {
        self.bookings
            .verify_by_qr_token(token)?
            .ok_or_else(|| LotError::BookingNotFound(token.to_string()))
    }

    // ── Ingestion and overrides ───────────────────────────────────────

    /// Hardware or attendant occupancy toggle. Pure registry transition,
    /// no session or booking side effects.
    pub async fn record_occupancy(&self, slot_id: &str, occupied: bool) -> Result<Slot> {
        let lock = self.slot_lock(slot_id);
        let _guard = lock.lock().await;

        let patch = if occupied {
            SlotPatch {
                occupied: Some(true),
                ..Default::default()
            }
        } else {
            SlotPatch::release_occupancy()
        };
        self.registry
            .apply_transition(slot_id, patch, TransitionCause::OccupancyEvent)
    }

    /// Admin override (maintenance, force-available). The patch is applied
    /// verbatim.
    pub async fn apply_override(&self, slot_id: &str, patch: SlotPatch) -> Result<Slot> {
        let lock = self.slot_lock(slot_id);
        let _guard = lock.lock().await;
        self.registry
            .apply_transition(slot_id, patch, TransitionCause::Override)
    }

    // ── Billing ───────────────────────────────────────────────────────

    /// Cut the single bill for an ended walk-in session.
    pub fn bill_session(&self, session_id: Uuid) -> Result<Bill> {
        let session = self
            .sessions
            .get(session_id)?
            .ok_or(LotError::SessionNotFound(session_id))?;
        let exit_time = session
            .exit_time
            .ok_or(LotError::SourceNotFinalized(session_id))?;

        // Check-and-set gate: at most one bill per session.
        self.sessions.mark_billed(session_id)?;

        let bill = Bill {
            bill_id: Uuid::new_v4(),
            bill_type: BillType::Walkin,
            reference_id: session_id,
            user_name: session.user_name,
            phone: session.phone,
            vehicle_number: session.vehicle_number,
            vehicle_type: session.vehicle_type,
            slot_id: session.slot_id,
            entry_time: Some(session.entry_time),
            exit_time,
            duration_minutes: session.duration_minutes,
            amount: session.amount,
            payment_method: session.payment_method,
            payment_status: PaymentStatus::Paid,
            created_at: Utc::now(),
        };
        if let Err(e) = self.bills.append(&bill) {
            // Re-open the gate so billing can be retried.
            if let Err(clear) = self.sessions.clear_billed(session_id) {
                error!(
                    target: "lotkeeper::coordinator",
                    session_id = %session_id,
                    "failed to clear billed flag after ledger failure: {clear}"
                );
            }
            return Err(e);
        }

        info!(
            target: "lotkeeper::coordinator",
            bill_id = %bill.bill_id,
            session_id = %session_id,
            amount = bill.amount,
            "walk-in bill appended"
        );
        Ok(bill)
    }

    /// Cut the single bill for a completed booking.
    pub fn bill_booking(&self, booking_id: Uuid) -> Result<Bill> {
        let booking = self
            .bookings
            .get(booking_id)?
            .ok_or_else(|| LotError::BookingNotFound(booking_id.to_string()))?;
        if booking.status != BookingStatus::Completed {
            return Err(LotError::SourceNotFinalized(booking_id));
        }
        if self
            .bills
            .find_by_reference(BillType::Booked, booking_id)?
            .is_some()
        {
            return Err(LotError::DuplicateBill(booking_id));
        }

        let bill = Bill {
            bill_id: Uuid::new_v4(),
            bill_type: BillType::Booked,
            reference_id: booking_id,
            user_name: booking.user_name,
            phone: booking.phone,
            vehicle_number: booking.vehicle_number,
            vehicle_type: booking.vehicle_type,
            slot_id: booking.slot_id,
            entry_time: booking.arrival_time,
            exit_time: Utc::now(),
            duration_minutes: None,
            amount: booking.amount,
            payment_method: booking.payment_status.as_str().to_string(),
            payment_status: PaymentStatus::Paid,
            created_at: Utc::now(),
        };
        self.bills.append(&bill)?;

        info!(
            target: "lotkeeper::coordinator",
            bill_id = %bill.bill_id,
            booking_id = %booking_id,
            amount = bill.amount,
            "booking bill appended"
        );
        Ok(bill)
    }

    // ── Reads and subscriptions ───────────────────────────────────────

    pub fn slots(&self) -> Vec<Slot> {
        self.registry.snapshot()
    }

    pub fn available_slots(&self) -> Vec<Slot> {
        self.registry.available()
    }

    pub fn slot(&self, slot_id: &str) -> Option<Slot> {
        self.registry.get(slot_id)
    }

    pub fn session(&self, id: Uuid) -> Result<Option<WalkInSession>> {
        self.sessions.get(id)
    }

    pub fn active_sessions(&self) -> Result<Vec<WalkInSession>> {
        self.sessions.list_active()
    }

    pub fn all_sessions(&self) -> Result<Vec<WalkInSession>> {
        self.sessions.list_all()
    }

    pub fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.bookings.get(id)
    }

    pub fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        self.bookings.list(filter)
    }

    pub fn bill(&self, id: Uuid) -> Result<Option<Bill>> {
        self.bills.get(id)
    }

    pub fn bills(&self) -> Result<Vec<Bill>> {
        self.bills.list()
    }

    pub fn pricing_rules(&self) -> Result<Vec<PricingRule>> {
        self.pricing.list()
    }

    pub fn pricing(&self) -> &PricingCatalog {
        &self.pricing
    }

    pub fn logs_for_date(&self, date: &str) -> Result<Vec<ActivityLogEntry>> {
        self.logs.list_for_date(date)
    }

    /// Subscribe to the slot change feed. Subscribe before snapshotting to
    /// avoid a gap; duplicates are absorbed by the upsert merge.
    pub fn subscribe_slots(&self) -> broadcast::Receiver<SlotChangeEvent> {
        self.bus.subscribe(SLOTS_TOPIC)
    }
}
