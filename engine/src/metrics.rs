use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub allocations: Arc<AtomicU64>,
    pub allocation_conflicts: Arc<AtomicU64>,
    pub allocation_no_capacity: Arc<AtomicU64>,

    pub reservations_cancelled: Arc<AtomicU64>,
    pub reservations_checked_in: Arc<AtomicU64>,
    pub reservations_expired: Arc<AtomicU64>,

    pub sweeps: Arc<AtomicU64>,
    pub sweep_failures: Arc<AtomicU64>,

    pub coherence_violations: Arc<AtomicU64>,
}
