use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as epoch milliseconds.
///
/// Every engine operation that cares about time takes a `now_ms` parameter
/// instead of reading the clock itself; callers pass this at the boundary.
/// Tests pass fabricated values to drive expiry deterministically.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
