//! The allocation engine: atomically pick one available bed and install an
//! active reservation on it.
//!
//! One attempt is one transaction:
//!   1. select the lowest-numbered available bed,
//!   2. CAS it `available -> held`,
//!   3. insert the reservation with a fresh code,
//!   4. commit.
//! Any failure rolls the whole attempt back; no partial effect is ever
//! visible. A CAS miss means a racing allocator won that bed, so the whole
//! attempt is retried with a short random jitter, bounded by
//! `allocation_retry_max`.

use std::time::Duration;

use rand::Rng;
use sqlx::SqlitePool;
use tracing::{debug, instrument, warn};

use crate::beds::{BedRegistry, BedStatus};
use crate::error::EngineError;
use crate::reservations::model::{Reservation, ReservationStatus, generate_code};
use crate::reservations::store::ReservationStore;

/// Attempts to insert a colliding code before giving up. Collisions on a
/// 31^6 space are vanishingly rare; this bound exists so a corrupt table
/// cannot loop forever.
const CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub caller_name: String,
    pub situation: String,
    pub needs: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct Allocated {
    pub code: String,
    pub bed_id: u16,
    pub expires_at_ms: u64,
}

/// Allocate the lowest available bed under a bounded retry loop.
#[instrument(
    skip(pool, req),
    target = "allocation",
    fields(caller = %req.caller_name)
)]
pub async fn allocate(
    pool: &SqlitePool,
    req: &AllocationRequest,
    hold_duration: Duration,
    retry_max: u32,
    now_ms: u64,
) -> Result<Allocated, EngineError> {
    let mut last_conflict = None;

    for attempt in 0..retry_max.max(1) {
        if attempt > 0 {
            // Tiny jitter decorrelates retrying allocators.
            let jitter_ms = rand::rng().random_range(1..=15);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        match allocate_once(pool, req, hold_duration, now_ms).await {
            Ok(allocated) => {
                debug!(
                    bed_id = allocated.bed_id,
                    code = %allocated.code,
                    attempt,
                    "bed allocated"
                );
                return Ok(allocated);
            }
            Err(EngineError::Conflict(msg)) => {
                debug!(attempt, conflict = %msg, "allocation attempt lost race; retrying");
                last_conflict = Some(msg);
            }
            Err(other) => return Err(other),
        }
    }

    warn!(retry_max, "allocation retries exhausted");
    Err(EngineError::Conflict(
        last_conflict.unwrap_or_else(|| "allocation retries exhausted".into()),
    ))
}

/// One atomic allocation attempt. `NoCapacity` and non-conflict errors are
/// final; `Conflict` is the caller's cue to retry.
async fn allocate_once(
    pool: &SqlitePool,
    req: &AllocationRequest,
    hold_duration: Duration,
    now_ms: u64,
) -> Result<Allocated, EngineError> {
    let mut tx = pool.begin().await?;

    let bed_id = match BedRegistry::lowest_available(&mut tx).await? {
        Some(id) => id,
        None => return Err(EngineError::NoCapacity),
    };

    // Re-verify under the transaction; a racing writer between the select
    // and here turns into a CAS miss.
    BedRegistry::transition(&mut tx, bed_id, BedStatus::Available, BedStatus::Held).await?;

    let expires_at_ms = now_ms + hold_duration.as_millis() as u64;

    let mut inserted = None;
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_code(&mut rand::rng());
        let reservation = Reservation {
            code: code.clone(),
            bed_id,
            caller_name: req.caller_name.clone(),
            situation: req.situation.clone(),
            needs: req.needs.clone(),
            language: req.language.clone(),
            created_at_ms: now_ms,
            expires_at_ms,
            terminal_at_ms: None,
            status: ReservationStatus::Active,
        };

        match ReservationStore::insert(&mut tx, &reservation).await {
            Ok(()) => {
                inserted = Some(code);
                break;
            }
            // Code collision: regenerate. Any other failure aborts the
            // attempt and rolls back the bed transition with it.
            Err(EngineError::Conflict(_)) => continue,
            Err(other) => return Err(other),
        }
    }

    let code = inserted.ok_or_else(|| {
        EngineError::internal("could not generate a unique reservation code")
    })?;

    tx.commit().await?;

    Ok(Allocated {
        code,
        bed_id,
        expires_at_ms,
    })
}
