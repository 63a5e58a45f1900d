//! Durable record of every reservation and its lifecycle transitions.
//!
//! The store only persists and maps rows; which transitions are legal is
//! decided by callers through the compare-and-set in `update_status`.
//! Like the registry, every function takes an executor so the service can
//! compose registry and store writes in one transaction.

use std::str::FromStr;

use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};

use crate::error::EngineError;
use crate::reservations::model::{Reservation, ReservationStatus};

pub struct ReservationStore;

impl ReservationStore {
    /// Insert a new reservation. A duplicate code surfaces as `Conflict`
    /// via the primary key; the allocator regenerates and retries.
    pub async fn insert(
        conn: &mut SqliteConnection,
        r: &Reservation,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
INSERT INTO reservations (
  code, bed_id, caller_name, situation, needs, language,
  created_at_ms, expires_at_ms, terminal_at_ms, status
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(&r.code)
        .bind(r.bed_id as i64)
        .bind(&r.caller_name)
        .bind(&r.situation)
        .bind(&r.needs)
        .bind(&r.language)
        .bind(u64_to_i64(r.created_at_ms)?)
        .bind(u64_to_i64(r.expires_at_ms)?)
        .bind(r.terminal_at_ms.map(u64_to_i64).transpose()?)
        .bind(r.status.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn get_by_code(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> Result<Option<Reservation>, EngineError> {
        let row = sqlx::query("SELECT * FROM reservations WHERE code = ?")
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|r| row_to_reservation(&r)).transpose()
    }

    pub async fn get_active_by_bed(
        conn: &mut SqliteConnection,
        bed_id: u16,
    ) -> Result<Option<Reservation>, EngineError> {
        let row = sqlx::query("SELECT * FROM reservations WHERE bed_id = ? AND status = 'active'")
            .bind(bed_id as i64)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|r| row_to_reservation(&r)).transpose()
    }

    /// The checked-in reservation whose guest is still in the bed, if any.
    /// Closed stays (checked out) carry a terminal timestamp and no longer
    /// bind the bed.
    pub async fn get_open_checked_in_by_bed(
        conn: &mut SqliteConnection,
        bed_id: u16,
    ) -> Result<Option<Reservation>, EngineError> {
        let row = sqlx::query(
            r#"
SELECT * FROM reservations
WHERE bed_id = ? AND status = 'checked_in' AND terminal_at_ms IS NULL
"#,
        )
        .bind(bed_id as i64)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|r| row_to_reservation(&r)).transpose()
    }

    /// Active reservations in creation order, code as tiebreaker.
    pub async fn list_active(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Reservation>, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM reservations WHERE status = 'active' ORDER BY created_at_ms, code",
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_reservation).collect()
    }

    /// Active reservations whose hold lapsed before `now_ms`. Served by the
    /// `(status, expires_at_ms)` index so each sweep is a range scan.
    pub async fn list_expiring_before(
        conn: &mut SqliteConnection,
        now_ms: u64,
    ) -> Result<Vec<Reservation>, EngineError> {
        let rows = sqlx::query(
            r#"
SELECT * FROM reservations
WHERE status = 'active' AND expires_at_ms < ?
ORDER BY expires_at_ms, code
"#,
        )
        .bind(u64_to_i64(now_ms)?)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_reservation).collect()
    }

    /// Compare-and-set on reservation status. Returns false on a CAS miss
    /// (the racing writer's outcome stands); terminal statuses can never be
    /// written over because callers always expect `active`.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        code: &str,
        expected: ReservationStatus,
        new: ReservationStatus,
        terminal_at_ms: Option<u64>,
    ) -> Result<bool, EngineError> {
        let res = sqlx::query(
            "UPDATE reservations SET status = ?, terminal_at_ms = ? WHERE code = ? AND status = ?",
        )
        .bind(new.as_str())
        .bind(terminal_at_ms.map(u64_to_i64).transpose()?)
        .bind(code)
        .bind(expected.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// Stamp the terminal timestamp on a checked-in reservation at checkout
    /// without touching its status; it has already satisfied.
    pub async fn finalize_checked_in_for_bed(
        conn: &mut SqliteConnection,
        bed_id: u16,
        now_ms: u64,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
UPDATE reservations SET terminal_at_ms = ?
WHERE bed_id = ? AND status = 'checked_in' AND terminal_at_ms IS NULL
"#,
        )
        .bind(u64_to_i64(now_ms)?)
        .bind(bed_id as i64)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_reservation(r: &SqliteRow) -> Result<Reservation, EngineError> {
    let status_str: String = r.get("status");
    let status = ReservationStatus::from_str(&status_str)?;

    Ok(Reservation {
        code: r.get::<String, _>("code"),
        bed_id: i64_to_bed_id(r.get("bed_id"))?,
        caller_name: r.get::<String, _>("caller_name"),
        situation: r.get::<String, _>("situation"),
        needs: r.get::<String, _>("needs"),
        language: r.get::<String, _>("language"),
        created_at_ms: i64_to_u64(r.get("created_at_ms"))?,
        expires_at_ms: i64_to_u64(r.get("expires_at_ms"))?,
        terminal_at_ms: r
            .get::<Option<i64>, _>("terminal_at_ms")
            .map(i64_to_u64)
            .transpose()?,
        status,
    })
}

fn i64_to_bed_id(v: i64) -> Result<u16, EngineError> {
    if !(1..=u16::MAX as i64).contains(&v) {
        return Err(EngineError::internal(format!("bed id out of range: {v}")));
    }
    Ok(v as u16)
}

fn i64_to_u64(v: i64) -> Result<u64, EngineError> {
    if v < 0 {
        return Err(EngineError::internal(format!(
            "negative i64 where u64 expected: {v}"
        )));
    }
    Ok(v as u64)
}

pub(crate) fn u64_to_i64(v: u64) -> Result<i64, EngineError> {
    if v > i64::MAX as u64 {
        return Err(EngineError::internal(format!("u64 too large for i64: {v}")));
    }
    Ok(v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    async fn setup_pool() -> SqlitePool {
        let conn = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn)
            .await
            .expect("connect sqlite memory db");
        crate::db::schema::migrate(&pool).await.expect("migrate");
        pool
    }

    fn mk_reservation(code: &str, bed_id: u16, created_at_ms: u64) -> Reservation {
        Reservation {
            code: code.to_string(),
            bed_id,
            caller_name: "John Smith".into(),
            situation: "eviction".into(),
            needs: String::new(),
            language: "en".into(),
            created_at_ms,
            expires_at_ms: created_at_ms + 10_800_000,
            terminal_at_ms: None,
            status: ReservationStatus::Active,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_roundtrip() {
        let pool = setup_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let r = mk_reservation("AAAAAA", 4, 1_000);
        ReservationStore::insert(&mut conn, &r).await.unwrap();

        let loaded = ReservationStore::get_by_code(&mut conn, "AAAAAA")
            .await
            .unwrap()
            .expect("reservation exists");
        assert_eq!(loaded.bed_id, 4);
        assert_eq!(loaded.status, ReservationStatus::Active);
        assert_eq!(loaded.expires_at_ms, 1_000 + 10_800_000);
        assert!(loaded.terminal_at_ms.is_none());
    }

    #[tokio::test]
    async fn duplicate_code_is_conflict() {
        let pool = setup_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        ReservationStore::insert(&mut conn, &mk_reservation("AAAAAA", 4, 1_000))
            .await
            .unwrap();
        let err = ReservationStore::insert(&mut conn, &mk_reservation("AAAAAA", 5, 2_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_active_orders_by_creation_then_code() {
        let pool = setup_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        ReservationStore::insert(&mut conn, &mk_reservation("ZZZZZZ", 1, 2_000))
            .await
            .unwrap();
        ReservationStore::insert(&mut conn, &mk_reservation("BBBBBB", 2, 1_000))
            .await
            .unwrap();
        ReservationStore::insert(&mut conn, &mk_reservation("AAAAAA", 3, 2_000))
            .await
            .unwrap();

        let codes: Vec<String> = ReservationStore::list_active(&mut conn)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.code)
            .collect();
        assert_eq!(codes, vec!["BBBBBB", "AAAAAA", "ZZZZZZ"]);
    }

    #[tokio::test]
    async fn expiring_before_is_strict_and_excludes_terminal() {
        let pool = setup_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut early = mk_reservation("EARLYA", 1, 0);
        early.expires_at_ms = 5_000;
        let mut late = mk_reservation("LATEAA", 2, 0);
        late.expires_at_ms = 50_000;
        let mut done = mk_reservation("DONEAA", 3, 0);
        done.expires_at_ms = 5_000;
        done.status = ReservationStatus::Cancelled;

        for r in [&early, &late, &done] {
            ReservationStore::insert(&mut conn, r).await.unwrap();
        }

        let due = ReservationStore::list_expiring_before(&mut conn, 10_000)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].code, "EARLYA");

        // Boundary: expires_at_ms == now is not yet due.
        let due = ReservationStore::list_expiring_before(&mut conn, 5_000)
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn update_status_cas_protects_terminal_states() {
        let pool = setup_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        ReservationStore::insert(&mut conn, &mk_reservation("AAAAAA", 4, 1_000))
            .await
            .unwrap();

        let won = ReservationStore::update_status(
            &mut conn,
            "AAAAAA",
            ReservationStatus::Active,
            ReservationStatus::Cancelled,
            Some(2_000),
        )
        .await
        .unwrap();
        assert!(won);

        // The losing writer observes a CAS miss, not a resurrection.
        let won = ReservationStore::update_status(
            &mut conn,
            "AAAAAA",
            ReservationStatus::Active,
            ReservationStatus::CheckedIn,
            Some(2_500),
        )
        .await
        .unwrap();
        assert!(!won);

        let r = ReservationStore::get_by_code(&mut conn, "AAAAAA")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(r.status, ReservationStatus::Cancelled);
        assert_eq!(r.terminal_at_ms, Some(2_000));
    }

    #[tokio::test]
    async fn finalize_stamps_only_open_checked_in_rows() {
        let pool = setup_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut r = mk_reservation("AAAAAA", 4, 1_000);
        r.status = ReservationStatus::CheckedIn;
        ReservationStore::insert(&mut conn, &r).await.unwrap();

        ReservationStore::finalize_checked_in_for_bed(&mut conn, 4, 9_000)
            .await
            .unwrap();
        ReservationStore::finalize_checked_in_for_bed(&mut conn, 4, 10_000)
            .await
            .unwrap();

        let loaded = ReservationStore::get_by_code(&mut conn, "AAAAAA")
            .await
            .unwrap()
            .unwrap();
        // Status untouched; first stamp wins, the second call is a no-op.
        assert_eq!(loaded.status, ReservationStatus::CheckedIn);
        assert_eq!(loaded.terminal_at_ms, Some(9_000));
    }
}
