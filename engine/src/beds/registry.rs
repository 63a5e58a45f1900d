//! The bed registry: the only writer of bed status.
//!
//! Every status change in the system funnels through `transition`, a
//! compare-and-set on the current status. Higher layers (allocation,
//! service, sweeper) compose these calls inside their own transactions;
//! the registry itself never opens one.

use std::str::FromStr;

use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::instrument;

use crate::beds::model::{Bed, BedCounts, BedStatus};
use crate::config::TOTAL_BEDS;
use crate::error::EngineError;

pub struct BedRegistry;

impl BedRegistry {
    /// Idempotently ensures beds `1..=108` exist as `available`.
    /// Existing rows are never overwritten; a restart mid-shift must not
    /// release anyone's bed.
    #[instrument(skip(pool), target = "registry")]
    pub async fn initialize(pool: &SqlitePool) -> Result<(), EngineError> {
        for bed_id in 1..=TOTAL_BEDS {
            sqlx::query("INSERT OR IGNORE INTO beds (bed_id, status, guest_id) VALUES (?, ?, NULL)")
                .bind(bed_id as i64)
                .bind(BedStatus::Available.as_str())
                .execute(pool)
                .await?;
        }

        let counts = Self::counts(pool).await?;
        if counts.total != TOTAL_BEDS as u32 {
            return Err(EngineError::internal(format!(
                "bed table corrupt: expected {TOTAL_BEDS} beds, found {}",
                counts.total
            )));
        }

        Ok(())
    }

    /// Consistent `(bed_id, status, guest)` listing ordered by id.
    pub async fn snapshot(pool: &SqlitePool) -> Result<Vec<Bed>, EngineError> {
        let rows = sqlx::query("SELECT bed_id, status, guest_id FROM beds ORDER BY bed_id")
            .fetch_all(pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(row_to_bed(&r)?);
        }
        Ok(out)
    }

    pub async fn counts(pool: &SqlitePool) -> Result<BedCounts, EngineError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM beds GROUP BY status")
            .fetch_all(pool)
            .await?;

        let mut counts = BedCounts {
            available: 0,
            held: 0,
            occupied: 0,
            total: 0,
        };
        for r in rows {
            let status = BedStatus::from_str(r.get::<String, _>("status").as_str())?;
            let n = r.get::<i64, _>("n") as u32;
            match status {
                BedStatus::Available => counts.available = n,
                BedStatus::Held => counts.held = n,
                BedStatus::Occupied => counts.occupied = n,
            }
            counts.total += n;
        }
        Ok(counts)
    }

    pub async fn get_status(
        conn: &mut SqliteConnection,
        bed_id: u16,
    ) -> Result<BedStatus, EngineError> {
        let row = sqlx::query("SELECT status FROM beds WHERE bed_id = ?")
            .bind(bed_id as i64)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(r) => BedStatus::from_str(r.get::<String, _>("status").as_str()),
            None => Err(EngineError::not_found(format!("bed {bed_id}"))),
        }
    }

    /// Compare-and-set on bed status. A CAS miss means a racing writer got
    /// there first; callers decide whether that is a retry or a surfaced
    /// conflict.
    pub async fn transition(
        conn: &mut SqliteConnection,
        bed_id: u16,
        from: BedStatus,
        to: BedStatus,
    ) -> Result<(), EngineError> {
        let res = sqlx::query("UPDATE beds SET status = ? WHERE bed_id = ? AND status = ?")
            .bind(to.as_str())
            .bind(bed_id as i64)
            .bind(from.as_str())
            .execute(&mut *conn)
            .await?;

        if res.rows_affected() != 1 {
            // Distinguish a missing bed from a status race for the caller.
            let current = Self::get_status(conn, bed_id).await?;
            return Err(EngineError::conflict(format!(
                "bed {bed_id} is {current}, expected {from}"
            )));
        }

        Ok(())
    }

    /// The allocation candidate: lowest-numbered available bed. Deterministic
    /// ordering keeps allocations replayable and occupancy packed low.
    pub async fn lowest_available(
        conn: &mut SqliteConnection,
    ) -> Result<Option<u16>, EngineError> {
        let row = sqlx::query(
            "SELECT bed_id FROM beds WHERE status = ? ORDER BY bed_id ASC LIMIT 1",
        )
        .bind(BedStatus::Available.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| r.get::<i64, _>("bed_id") as u16))
    }

    pub async fn attach_guest(
        conn: &mut SqliteConnection,
        bed_id: u16,
        guest_id: &str,
    ) -> Result<(), EngineError> {
        let res = sqlx::query(
            "UPDATE beds SET guest_id = ? WHERE bed_id = ? AND status IN ('held', 'occupied')",
        )
        .bind(guest_id)
        .bind(bed_id as i64)
        .execute(&mut *conn)
        .await?;

        if res.rows_affected() != 1 {
            let current = Self::get_status(conn, bed_id).await?;
            return Err(EngineError::conflict(format!(
                "cannot attach guest to bed {bed_id} while {current}"
            )));
        }
        Ok(())
    }

    pub async fn clear_guest(
        conn: &mut SqliteConnection,
        bed_id: u16,
    ) -> Result<(), EngineError> {
        sqlx::query("UPDATE beds SET guest_id = NULL WHERE bed_id = ?")
            .bind(bed_id as i64)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

fn row_to_bed(r: &sqlx::sqlite::SqliteRow) -> Result<Bed, EngineError> {
    let bed_id = r.get::<i64, _>("bed_id");
    if !(1..=TOTAL_BEDS as i64).contains(&bed_id) {
        return Err(EngineError::internal(format!(
            "bed id out of range: {bed_id}"
        )));
    }
    Ok(Bed {
        bed_id: bed_id as u16,
        status: BedStatus::from_str(r.get::<String, _>("status").as_str())?,
        guest_id: r.get::<Option<String>, _>("guest_id"),
    })
}
