//! Chapel service scheduling.
//!
//! Services run on weekdays at three fixed start times. All validation
//! happens here, never in the call session: the tool boundary cannot trust
//! slot values that came out of a conversation. The `Validation` messages
//! the voice tools branch on (`invalid_date`, `invalid_time`,
//! `weekend_disallowed`) are stable identifiers.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::CHAPEL_TIME_SLOTS;
use crate::error::EngineError;
use crate::reservations::store::u64_to_i64;

#[derive(Debug, Clone)]
pub struct ChapelRequest {
    /// ISO date, e.g. `2026-08-03`.
    pub service_date: String,
    /// One of the fixed start times, e.g. `10:00`.
    pub service_time: String,
    pub group_name: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapelBooking {
    pub booking_id: String,
    pub service_date: String,
    pub service_time: String,
    pub group_name: String,
}

pub struct ChapelSchedule {
    pool: SqlitePool,
}

impl ChapelSchedule {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Book a slot. `slot_taken` surfaces as `Conflict` via the
    /// (date, time) uniqueness constraint; nothing is inserted on any
    /// validation failure.
    #[instrument(skip(self, req), target = "chapel", fields(date = %req.service_date, time = %req.service_time))]
    pub async fn schedule(
        &self,
        req: &ChapelRequest,
        now_ms: u64,
    ) -> Result<ChapelBooking, EngineError> {
        let date = NaiveDate::parse_from_str(req.service_date.trim(), "%Y-%m-%d")
            .map_err(|_| EngineError::validation("invalid_date"))?;

        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(EngineError::validation("weekend_disallowed"));
        }

        let time = req.service_time.trim();
        if !CHAPEL_TIME_SLOTS.contains(&time) {
            return Err(EngineError::validation("invalid_time"));
        }

        if req.group_name.trim().is_empty() {
            return Err(EngineError::validation("group_name must not be empty"));
        }

        let booking_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
INSERT INTO chapel_bookings (
  booking_id, service_date, service_time, group_name, contact, created_at_ms
)
VALUES (?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(&booking_id)
        .bind(date.to_string())
        .bind(time)
        .bind(req.group_name.trim())
        .bind(req.contact.trim())
        .bind(u64_to_i64(now_ms)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match EngineError::from(e) {
            EngineError::Conflict(_) => EngineError::conflict("slot_taken"),
            other => other,
        })?;

        info!(booking_id = %booking_id, "chapel service scheduled");

        Ok(ChapelBooking {
            booking_id,
            service_date: date.to_string(),
            service_time: time.to_string(),
            group_name: req.group_name.trim().to_string(),
        })
    }
}
