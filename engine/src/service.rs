//! The reservation service: the public face of the engine.
//!
//! Responsibilities:
//! - Compose registry and store mutations inside one transaction per
//!   operation; callers never observe a bed inconsistent with its
//!   reservation.
//! - Enqueue notifier events strictly after commit.
//! - Surface the closed error-kind set of `EngineError`.
//!
//! Non-responsibilities:
//! - Picking beds (allocation module).
//! - Timing sweeps (expiry module drives `expire_due`).
//! - Formatting anything for HTTP or speech.

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, instrument, warn};

use common::logger::warn_if_slow;

use crate::allocation::{self, Allocated, AllocationRequest};
use crate::beds::{Bed, BedCounts, BedRegistry, BedStatus};
use crate::config::{AppConfig, TOTAL_BEDS};
use crate::error::EngineError;
use crate::metrics::Counters;
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::reservations::model::{Reservation, ReservationStatus, generate_code};
use crate::reservations::store::ReservationStore;

const SLOW_OP: Duration = Duration::from_millis(100);

/// An active reservation as readers see it: remaining time is computed at
/// read time, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveHold {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub remaining_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// The reservation was already terminal; cancelling again is a no-op.
    AlreadyTerminal,
}

pub struct ReservationService {
    pool: SqlitePool,
    notifier: ChangeNotifier,
    counters: Counters,

    hold_duration: Duration,
    allocation_retry_max: u32,
}

impl ReservationService {
    pub fn new(
        pool: SqlitePool,
        notifier: ChangeNotifier,
        counters: Counters,
        cfg: &AppConfig,
    ) -> Self {
        Self {
            pool,
            notifier,
            counters,
            hold_duration: cfg.hold_duration,
            allocation_retry_max: cfg.allocation_retry_max,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Create a reservation on the lowest available bed.
    #[instrument(skip(self, req), target = "service", fields(caller = %req.caller_name))]
    pub async fn create(
        &self,
        req: &AllocationRequest,
        now_ms: u64,
    ) -> Result<Allocated, EngineError> {
        if req.caller_name.trim().is_empty() {
            return Err(EngineError::validation("caller_name must not be empty"));
        }

        let result = warn_if_slow("allocate", SLOW_OP, async {
            allocation::allocate(
                &self.pool,
                req,
                self.hold_duration,
                self.allocation_retry_max,
                now_ms,
            )
            .await
        })
        .await;

        match &result {
            Ok(allocated) => {
                self.counters.allocations.fetch_add(1, Ordering::Relaxed);
                self.notifier.publish_all([
                    ChangeEvent::BedStatusChanged {
                        bed_id: allocated.bed_id,
                        from: BedStatus::Available,
                        to: BedStatus::Held,
                    },
                    ChangeEvent::ReservationCreated {
                        code: allocated.code.clone(),
                        bed_id: allocated.bed_id,
                        expires_at_ms: allocated.expires_at_ms,
                    },
                ]);
                info!(bed_id = allocated.bed_id, code = %allocated.code, "reservation created");
            }
            Err(EngineError::NoCapacity) => {
                self.counters
                    .allocation_no_capacity
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(EngineError::Conflict(_)) => {
                self.counters
                    .allocation_conflicts
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }

        result
    }

    /// Cancel a reservation and release its bed. Idempotent: cancelling a
    /// reservation that already reached a terminal status succeeds without
    /// touching anything.
    #[instrument(skip(self), target = "service", fields(code = %code))]
    pub async fn cancel(&self, code: &str, now_ms: u64) -> Result<CancelOutcome, EngineError> {
        let mut tx = self.pool.begin().await?;

        let reservation = ReservationStore::get_by_code(&mut tx, code)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("reservation {code}")))?;

        if reservation.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal);
        }

        let won = ReservationStore::update_status(
            &mut tx,
            code,
            ReservationStatus::Active,
            ReservationStatus::Cancelled,
            Some(now_ms),
        )
        .await?;
        if !won {
            return Err(EngineError::conflict(format!(
                "reservation {code} changed state concurrently"
            )));
        }

        BedRegistry::transition(&mut tx, reservation.bed_id, BedStatus::Held, BedStatus::Available)
            .await?;

        tx.commit().await?;

        self.counters
            .reservations_cancelled
            .fetch_add(1, Ordering::Relaxed);
        self.notifier.publish_all([
            ChangeEvent::ReservationCancelled {
                code: code.to_string(),
                bed_id: reservation.bed_id,
            },
            ChangeEvent::BedStatusChanged {
                bed_id: reservation.bed_id,
                from: BedStatus::Held,
                to: BedStatus::Available,
            },
        ]);
        info!(bed_id = reservation.bed_id, "reservation cancelled");

        Ok(CancelOutcome::Cancelled)
    }

    /// Check a caller into their held bed.
    #[instrument(skip(self), target = "service", fields(code = %code, bed_id))]
    pub async fn check_in(
        &self,
        code: &str,
        bed_id: u16,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;

        let reservation = ReservationStore::get_by_code(&mut tx, code)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("reservation {code}")))?;

        if reservation.bed_id != bed_id {
            return Err(EngineError::conflict(format!(
                "bed_mismatch: reservation {code} is for bed {}",
                reservation.bed_id
            )));
        }

        match reservation.status {
            // Re-running a completed check-in converges to the same state,
            // unless the stay already ended.
            ReservationStatus::CheckedIn => {
                if reservation.terminal_at_ms.is_some() {
                    return Err(EngineError::conflict(format!(
                        "reservation {code} was already checked out"
                    )));
                }
                return Ok(());
            }
            ReservationStatus::Cancelled => {
                return Err(EngineError::conflict(format!(
                    "reservation {code} was cancelled"
                )));
            }
            ReservationStatus::Expired => {
                return Err(EngineError::Expired(code.to_string()));
            }
            ReservationStatus::Active => {}
        }

        // A lapsed hold the sweeper has not reclaimed yet is not silently
        // extended; staff re-book explicitly.
        if reservation.is_expired(now_ms) {
            return Err(EngineError::Expired(code.to_string()));
        }

        // The terminal timestamp is stamped at checkout, not here; an open
        // checked-in reservation is one whose guest is still in the bed.
        let won = ReservationStore::update_status(
            &mut tx,
            code,
            ReservationStatus::Active,
            ReservationStatus::CheckedIn,
            None,
        )
        .await?;
        if !won {
            return Err(EngineError::conflict(format!(
                "reservation {code} changed state concurrently"
            )));
        }

        BedRegistry::transition(&mut tx, bed_id, BedStatus::Held, BedStatus::Occupied).await?;

        tx.commit().await?;

        self.counters
            .reservations_checked_in
            .fetch_add(1, Ordering::Relaxed);
        self.notifier.publish_all([
            ChangeEvent::ReservationCheckedIn {
                code: code.to_string(),
                bed_id,
            },
            ChangeEvent::BedStatusChanged {
                bed_id,
                from: BedStatus::Held,
                to: BedStatus::Occupied,
            },
        ]);
        info!("reservation checked in");

        Ok(())
    }

    /// Release an occupied bed. The checked-in reservation keeps its status
    /// and gains a terminal timestamp; it has already satisfied. Idempotent
    /// when the bed is already available.
    #[instrument(skip(self), target = "service", fields(bed_id))]
    pub async fn check_out(&self, bed_id: u16, now_ms: u64) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;

        match BedRegistry::get_status(&mut tx, bed_id).await? {
            BedStatus::Available => return Ok(()),
            BedStatus::Held => {
                return Err(EngineError::conflict(format!(
                    "bed {bed_id} is held; cancel the reservation instead"
                )));
            }
            BedStatus::Occupied => {}
        }

        BedRegistry::transition(&mut tx, bed_id, BedStatus::Occupied, BedStatus::Available)
            .await?;
        ReservationStore::finalize_checked_in_for_bed(&mut tx, bed_id, now_ms).await?;
        BedRegistry::clear_guest(&mut tx, bed_id).await?;

        tx.commit().await?;

        self.notifier.publish(ChangeEvent::BedStatusChanged {
            bed_id,
            from: BedStatus::Occupied,
            to: BedStatus::Available,
        });
        info!("bed checked out");

        Ok(())
    }

    /// Manual staff hold on a specific bed. Creates a shadow reservation so
    /// the bed-reservation coherence invariant holds globally; the hold
    /// expires on the same schedule as a phoned-in one.
    #[instrument(skip(self, note), target = "service", fields(bed_id))]
    pub async fn hold(
        &self,
        bed_id: u16,
        note: &str,
        now_ms: u64,
    ) -> Result<Allocated, EngineError> {
        let mut tx = self.pool.begin().await?;

        BedRegistry::transition(&mut tx, bed_id, BedStatus::Available, BedStatus::Held).await?;

        let expires_at_ms = now_ms + self.hold_duration.as_millis() as u64;
        let code = generate_code(&mut rand::rng());
        let reservation = Reservation {
            code: code.clone(),
            bed_id,
            caller_name: if note.trim().is_empty() {
                "front desk hold".to_string()
            } else {
                note.to_string()
            },
            situation: "manual hold".into(),
            needs: String::new(),
            language: "en".into(),
            created_at_ms: now_ms,
            expires_at_ms,
            terminal_at_ms: None,
            status: ReservationStatus::Active,
        };
        ReservationStore::insert(&mut tx, &reservation).await?;

        tx.commit().await?;

        self.notifier.publish_all([
            ChangeEvent::BedStatusChanged {
                bed_id,
                from: BedStatus::Available,
                to: BedStatus::Held,
            },
            ChangeEvent::ReservationCreated {
                code: code.clone(),
                bed_id,
                expires_at_ms,
            },
        ]);
        info!(code = %code, "manual hold placed");

        Ok(Allocated {
            code,
            bed_id,
            expires_at_ms,
        })
    }

    /// Attach a guest record to a held or occupied bed.
    pub async fn assign_guest(&self, bed_id: u16, guest_id: &str) -> Result<(), EngineError> {
        if guest_id.trim().is_empty() {
            return Err(EngineError::validation("guest_id must not be empty"));
        }

        let mut conn = self.pool.acquire().await?;
        BedRegistry::attach_guest(&mut conn, bed_id, guest_id).await
    }

    pub async fn list_active(&self, now_ms: u64) -> Result<Vec<ActiveHold>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        let active = ReservationStore::list_active(&mut conn).await?;

        Ok(active
            .into_iter()
            .map(|reservation| {
                let remaining_ms = reservation.remaining_ms(now_ms);
                ActiveHold {
                    reservation,
                    remaining_ms,
                }
            })
            .collect())
    }

    pub async fn get_reservation(&self, code: &str) -> Result<Reservation, EngineError> {
        let mut conn = self.pool.acquire().await?;
        ReservationStore::get_by_code(&mut conn, code)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("reservation {code}")))
    }

    pub async fn bed_counts(&self) -> Result<BedCounts, EngineError> {
        BedRegistry::counts(&self.pool).await
    }

    pub async fn bed_snapshot(&self) -> Result<Vec<Bed>, EngineError> {
        BedRegistry::snapshot(&self.pool).await
    }

    /// Expire every active reservation whose hold lapsed before `now_ms`
    /// and release its bed. Each reservation is its own transaction so one
    /// contested row cannot wedge the sweep. Returns how many were expired.
    #[instrument(skip(self), target = "service")]
    pub async fn expire_due(&self, now_ms: u64) -> Result<usize, EngineError> {
        let due = {
            let mut conn = self.pool.acquire().await?;
            ReservationStore::list_expiring_before(&mut conn, now_ms).await?
        };

        let mut swept = 0usize;
        for reservation in due {
            match self.expire_one(&reservation, now_ms).await {
                Ok(true) => swept += 1,
                // A racing check-in or cancel won; the winner's effect
                // stands and this is not an error.
                Ok(false) => {}
                Err(e) => {
                    self.counters.sweep_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(code = %reservation.code, error = %e, "failed to expire reservation");
                }
            }
        }

        if swept > 0 {
            info!(swept, "expired lapsed holds");
        }
        Ok(swept)
    }

    async fn expire_one(
        &self,
        reservation: &Reservation,
        now_ms: u64,
    ) -> Result<bool, EngineError> {
        let mut tx = self.pool.begin().await?;

        let won = ReservationStore::update_status(
            &mut tx,
            &reservation.code,
            ReservationStatus::Active,
            ReservationStatus::Expired,
            Some(now_ms),
        )
        .await?;
        if !won {
            return Ok(false);
        }

        // Having won the status CAS inside this transaction, the bed must
        // still be held; anything else is an invariant breach. Roll back and
        // leave the row for the next sweep rather than guess.
        if let Err(e) =
            BedRegistry::transition(&mut tx, reservation.bed_id, BedStatus::Held, BedStatus::Available)
                .await
        {
            self.counters
                .coherence_violations
                .fetch_add(1, Ordering::Relaxed);
            error!(
                code = %reservation.code,
                bed_id = reservation.bed_id,
                error = %e,
                "bed/reservation coherence violated during expiry"
            );
            return Err(e);
        }

        tx.commit().await?;

        self.counters
            .reservations_expired
            .fetch_add(1, Ordering::Relaxed);
        self.notifier.publish_all([
            ChangeEvent::ReservationExpired {
                code: reservation.code.clone(),
                bed_id: reservation.bed_id,
            },
            ChangeEvent::BedStatusChanged {
                bed_id: reservation.bed_id,
                from: BedStatus::Held,
                to: BedStatus::Available,
            },
        ]);

        Ok(true)
    }

    /// Check the capacity and coherence invariants. Returns human-readable
    /// violations; empty means healthy. Startup treats any violation as
    /// fatal, the runtime path logs and keeps serving.
    pub async fn verify_coherence(&self) -> Result<Vec<String>, EngineError> {
        let mut violations = Vec::new();

        let counts = BedRegistry::counts(&self.pool).await?;
        if counts.total != TOTAL_BEDS as u32 {
            violations.push(format!(
                "bed count is {}, expected {TOTAL_BEDS}",
                counts.total
            ));
        }

        let beds = BedRegistry::snapshot(&self.pool).await?;
        let mut conn = self.pool.acquire().await?;
        for bed in beds {
            let active = ReservationStore::get_active_by_bed(&mut conn, bed.bed_id).await?;
            let open_checked_in =
                ReservationStore::get_open_checked_in_by_bed(&mut conn, bed.bed_id).await?;
            match bed.status {
                BedStatus::Available => {
                    if let Some(r) = active {
                        violations.push(format!(
                            "bed {} is available but reservation {} is active",
                            bed.bed_id, r.code
                        ));
                    }
                    if let Some(r) = open_checked_in {
                        violations.push(format!(
                            "bed {} is available but reservation {} is still checked in",
                            bed.bed_id, r.code
                        ));
                    }
                }
                BedStatus::Held => {
                    if active.is_none() {
                        violations
                            .push(format!("bed {} is held with no active reservation", bed.bed_id));
                    }
                }
                BedStatus::Occupied => {
                    if active.is_some() {
                        violations.push(format!(
                            "bed {} is occupied but still has an active reservation",
                            bed.bed_id
                        ));
                    }
                    if open_checked_in.is_none() {
                        violations.push(format!(
                            "bed {} is occupied with no checked-in reservation",
                            bed.bed_id
                        ));
                    }
                }
            }
        }

        if !violations.is_empty() {
            self.counters
                .coherence_violations
                .fetch_add(violations.len() as u64, Ordering::Relaxed);
            for v in &violations {
                error!(violation = %v, "invariant violation");
            }
        }

        Ok(violations)
    }
}
