//! End-to-end lifecycle scenarios against an isolated in-memory database.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use engine::allocation::AllocationRequest;
use engine::beds::BedRegistry;
use engine::config::AppConfig;
use engine::db::schema;
use engine::error::EngineError;
use engine::metrics::Counters;
use engine::notify::ChangeNotifier;
use engine::reservations::ReservationStatus;
use engine::service::{CancelOutcome, ReservationService};

const HOLD_MS: u64 = 3 * 60 * 60 * 1_000;
const TICK_MS: u64 = 30_000;
const T0: u64 = 1_000_000;

/// Isolated in-memory DB per test. Unique name prevents interference during
/// parallel execution; `cache=shared` lets every pool connection see it.
async fn setup_pool() -> SqlitePool {
    let conn = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&conn)
        .await
        .expect("connect sqlite memory db");
    schema::migrate(&pool).await.expect("migrate");
    BedRegistry::initialize(&pool).await.expect("initialize beds");
    pool
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: String::new(),
        bind_addr: String::new(),
        hold_duration: Duration::from_millis(HOLD_MS),
        expiration_tick: Duration::from_millis(TICK_MS),
        allocation_retry_max: 8,
        idle_session_timeout: Duration::from_secs(20),
        tool_call_deadline: Duration::from_secs(10),
        max_call_sessions: 64,
        notifier_capacity: 256,
    }
}

async fn setup_service() -> Arc<ReservationService> {
    let pool = setup_pool().await;
    Arc::new(ReservationService::new(
        pool,
        ChangeNotifier::new(256),
        Counters::default(),
        &test_config(),
    ))
}

fn mk_request(name: &str) -> AllocationRequest {
    AllocationRequest {
        caller_name: name.to_string(),
        situation: "eviction".into(),
        needs: String::new(),
        language: "en".into(),
    }
}

async fn assert_coherent(service: &ReservationService) {
    let violations = service.verify_coherence().await.unwrap();
    assert!(violations.is_empty(), "invariant violations: {violations:?}");
}

// -----------------------
// Scenarios
// -----------------------

#[tokio::test]
async fn happy_path_allocates_bed_one_with_full_hold() {
    let service = setup_service().await;

    let allocated = service
        .create(&mk_request("John Smith"), T0)
        .await
        .unwrap();
    assert_eq!(allocated.bed_id, 1);
    assert_eq!(allocated.expires_at_ms, T0 + HOLD_MS);

    let counts = service.bed_counts().await.unwrap();
    assert_eq!(counts.held, 1);
    assert_eq!(counts.available, 107);
    assert_eq!(counts.total, 108);

    let active = service.list_active(T0).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].reservation.bed_id, 1);
    assert_eq!(active[0].reservation.created_at_ms, T0);
    assert_eq!(active[0].remaining_ms, HOLD_MS);

    assert_coherent(&service).await;
}

#[tokio::test]
async fn check_in_occupies_the_bed() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();

    service.check_in(&allocated.code, 1, T0 + 60_000).await.unwrap();

    let counts = service.bed_counts().await.unwrap();
    assert_eq!(counts.occupied, 1);
    assert_eq!(counts.available, 107);

    let r = service.get_reservation(&allocated.code).await.unwrap();
    assert_eq!(r.status, ReservationStatus::CheckedIn);
    assert!(r.terminal_at_ms.is_none());

    assert!(service.list_active(T0).await.unwrap().is_empty());
    assert_coherent(&service).await;
}

#[tokio::test]
async fn expiration_releases_the_bed_after_the_hold_lapses() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();

    // One tick past the hold.
    let later = T0 + HOLD_MS + TICK_MS;
    let swept = service.expire_due(later).await.unwrap();
    assert_eq!(swept, 1);

    let r = service.get_reservation(&allocated.code).await.unwrap();
    assert_eq!(r.status, ReservationStatus::Expired);
    assert_eq!(r.terminal_at_ms, Some(later));

    let counts = service.bed_counts().await.unwrap();
    assert_eq!(counts.available, 108);

    // Running the sweep again with no new expirations is a no-op.
    assert_eq!(service.expire_due(later).await.unwrap(), 0);
    assert_coherent(&service).await;
}

#[tokio::test]
async fn sweep_leaves_unexpired_holds_alone() {
    let service = setup_service().await;
    service.create(&mk_request("John Smith"), T0).await.unwrap();

    let swept = service.expire_due(T0 + HOLD_MS - 1).await.unwrap();
    assert_eq!(swept, 0);

    let counts = service.bed_counts().await.unwrap();
    assert_eq!(counts.held, 1);
}

#[tokio::test]
async fn cancel_and_check_in_race_produces_one_winner() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();
    let code = allocated.code.clone();

    let (cancel_res, checkin_res) = tokio::join!(
        service.cancel(&code, T0 + 1_000),
        service.check_in(&code, 1, T0 + 1_000),
    );

    let cancelled = matches!(cancel_res, Ok(CancelOutcome::Cancelled));
    let checked_in = checkin_res.is_ok();
    assert!(
        !(cancelled && checked_in),
        "both cancel and check-in claimed the mutation"
    );

    // Whatever interleaving happened, the final state is consistent.
    let r = service.get_reservation(&code).await.unwrap();
    let counts = service.bed_counts().await.unwrap();
    match r.status {
        ReservationStatus::Cancelled => {
            assert_eq!(counts.available, 108);
            assert_eq!(counts.occupied, 0);
        }
        ReservationStatus::CheckedIn => {
            assert_eq!(counts.occupied, 1);
            assert_eq!(counts.available, 107);
        }
        other => panic!("reservation ended in non-terminal state {other}"),
    }
    assert_coherent(&service).await;
}

#[tokio::test]
async fn capacity_exhaustion_reports_no_capacity_without_side_effect() {
    let service = setup_service().await;

    for i in 0..108 {
        service
            .create(&mk_request(&format!("caller-{i}")), T0)
            .await
            .unwrap();
    }

    let err = service
        .create(&mk_request("caller-109"), T0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoCapacity));

    let counts = service.bed_counts().await.unwrap();
    assert_eq!(counts.held, 108);
    assert_eq!(counts.available, 0);
    assert_eq!(service.list_active(T0).await.unwrap().len(), 108);
    assert_coherent(&service).await;
}

// -----------------------
// Idempotency and edge cases
// -----------------------

#[tokio::test]
async fn cancel_twice_converges() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();

    let first = service.cancel(&allocated.code, T0 + 1_000).await.unwrap();
    assert_eq!(first, CancelOutcome::Cancelled);

    let second = service.cancel(&allocated.code, T0 + 2_000).await.unwrap();
    assert_eq!(second, CancelOutcome::AlreadyTerminal);

    let r = service.get_reservation(&allocated.code).await.unwrap();
    assert_eq!(r.status, ReservationStatus::Cancelled);
    assert_eq!(r.terminal_at_ms, Some(T0 + 1_000));
    assert_eq!(service.bed_counts().await.unwrap().available, 108);
}

#[tokio::test]
async fn check_in_twice_converges_and_check_out_twice_converges() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();

    service.check_in(&allocated.code, 1, T0 + 1_000).await.unwrap();
    service.check_in(&allocated.code, 1, T0 + 2_000).await.unwrap();
    assert_eq!(service.bed_counts().await.unwrap().occupied, 1);

    service.check_out(1, T0 + 3_000).await.unwrap();
    service.check_out(1, T0 + 4_000).await.unwrap();

    let r = service.get_reservation(&allocated.code).await.unwrap();
    assert_eq!(r.status, ReservationStatus::CheckedIn);
    assert_eq!(r.terminal_at_ms, Some(T0 + 3_000));
    assert_eq!(service.bed_counts().await.unwrap().available, 108);
    assert_coherent(&service).await;
}

#[tokio::test]
async fn check_in_rejects_wrong_bed_and_lapsed_hold() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();

    let err = service
        .check_in(&allocated.code, 2, T0 + 1_000)
        .await
        .unwrap_err();
    assert!(matches!(&err, EngineError::Conflict(m) if m.starts_with("bed_mismatch")));

    let err = service
        .check_in(&allocated.code, 1, T0 + HOLD_MS + 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Expired(_)));

    // Neither rejection touched state.
    let counts = service.bed_counts().await.unwrap();
    assert_eq!(counts.held, 1);
    assert_coherent(&service).await;
}

#[tokio::test]
async fn expired_reservation_cannot_be_checked_in_after_sweep() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();

    let later = T0 + HOLD_MS + TICK_MS;
    service.expire_due(later).await.unwrap();

    let err = service.check_in(&allocated.code, 1, later).await.unwrap_err();
    assert!(matches!(err, EngineError::Expired(_)));

    // The bed went back into the pool and is allocated fresh.
    let next = service.create(&mk_request("Next Caller"), later).await.unwrap();
    assert_eq!(next.bed_id, 1);
}

#[tokio::test]
async fn check_in_beats_the_sweep_when_it_runs_first() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();

    // Deliberate late check-in before any sweep ran.
    let late = T0 + HOLD_MS - 1;
    service.check_in(&allocated.code, 1, late).await.unwrap();

    // The sweep afterwards must leave the winner's effect in place.
    let swept = service.expire_due(T0 + HOLD_MS + TICK_MS).await.unwrap();
    assert_eq!(swept, 0);

    let r = service.get_reservation(&allocated.code).await.unwrap();
    assert_eq!(r.status, ReservationStatus::CheckedIn);
    assert_eq!(service.bed_counts().await.unwrap().occupied, 1);
    assert_coherent(&service).await;
}

#[tokio::test]
async fn cancel_unknown_code_is_not_found() {
    let service = setup_service().await;
    let err = service.cancel("NOSUCH", T0).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

// -----------------------
// Manual holds and guests
// -----------------------

#[tokio::test]
async fn manual_hold_creates_a_shadow_reservation() {
    let service = setup_service().await;

    let held = service.hold(17, "front desk", T0).await.unwrap();
    assert_eq!(held.bed_id, 17);
    assert_eq!(held.expires_at_ms, T0 + HOLD_MS);

    // The shadow reservation keeps the coherence invariant intact and
    // expires like any phoned-in hold.
    assert_coherent(&service).await;
    let swept = service.expire_due(T0 + HOLD_MS + TICK_MS).await.unwrap();
    assert_eq!(swept, 1);
    assert_eq!(service.bed_counts().await.unwrap().available, 108);
}

#[tokio::test]
async fn manual_hold_on_taken_bed_is_conflict() {
    let service = setup_service().await;
    service.hold(17, "front desk", T0).await.unwrap();

    let err = service.hold(17, "front desk", T0).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn guest_assignment_follows_the_bed_through_checkout() {
    let service = setup_service().await;
    let allocated = service.create(&mk_request("John Smith"), T0).await.unwrap();
    service.check_in(&allocated.code, 1, T0 + 1_000).await.unwrap();

    service.assign_guest(1, "guest-42").await.unwrap();
    let beds = service.bed_snapshot().await.unwrap();
    assert_eq!(beds[0].guest_id.as_deref(), Some("guest-42"));

    service.check_out(1, T0 + 2_000).await.unwrap();
    let beds = service.bed_snapshot().await.unwrap();
    assert!(beds[0].guest_id.is_none());
}

// -----------------------
// Capacity invariant under churn
// -----------------------

#[tokio::test]
async fn status_counts_always_sum_to_108_under_mixed_operations() {
    let service = setup_service().await;

    let a = service.create(&mk_request("a"), T0).await.unwrap();
    let b = service.create(&mk_request("b"), T0).await.unwrap();
    let _c = service.create(&mk_request("c"), T0).await.unwrap();

    service.check_in(&a.code, a.bed_id, T0 + 1_000).await.unwrap();
    service.cancel(&b.code, T0 + 2_000).await.unwrap();

    for now in [T0, T0 + 3_000, T0 + HOLD_MS + TICK_MS] {
        service.expire_due(now).await.unwrap();
        let counts = service.bed_counts().await.unwrap();
        assert_eq!(
            counts.available + counts.held + counts.occupied,
            108,
            "counts diverged at now={now}: {counts:?}"
        );
    }

    assert_coherent(&service).await;
}
