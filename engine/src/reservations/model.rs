use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Characters used in reservation codes. Ambiguous glyphs (0/O, 1/I/L) are
/// left out because callers read these back over the phone.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

/// Generate a fresh candidate reservation code. Uniqueness is enforced by
/// the store's primary key; collisions are retried by the allocator.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Canonical reservation lifecycle status. Terminal statuses are never
/// resurrected; the store's compare-and-set is what enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    CheckedIn,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::CheckedIn => "checked_in",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "checked_in" => Ok(ReservationStatus::CheckedIn),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(EngineError::internal(format!(
                "invalid reservation status value: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    /// Caller-visible code; their sole handle for follow-up.
    pub code: String,
    pub bed_id: u16,

    pub caller_name: String,
    pub situation: String,
    pub needs: String,
    pub language: String,

    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub terminal_at_ms: Option<u64>,

    pub status: ReservationStatus,
}

impl Reservation {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.status == ReservationStatus::Active && now_ms > self.expires_at_ms
    }

    /// Milliseconds of hold left, clamped at zero. Computed at read time;
    /// never stored.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at_ms.saturating_sub(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn status_roundtrips_through_storage_form() {
        for s in [
            ReservationStatus::Active,
            ReservationStatus::CheckedIn,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ] {
            assert_eq!(s.as_str().parse::<ReservationStatus>().unwrap(), s);
        }
    }

    #[test]
    fn only_active_is_non_terminal() {
        assert!(!ReservationStatus::Active.is_terminal());
        assert!(ReservationStatus::CheckedIn.is_terminal());
        assert!(ReservationStatus::Cancelled.is_terminal());
        assert!(ReservationStatus::Expired.is_terminal());
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let r = Reservation {
            code: "ABCDEF".into(),
            bed_id: 1,
            caller_name: "John Smith".into(),
            situation: "eviction".into(),
            needs: String::new(),
            language: "en".into(),
            created_at_ms: 1_000,
            expires_at_ms: 2_000,
            terminal_at_ms: None,
            status: ReservationStatus::Active,
        };

        assert!(!r.is_expired(2_000));
        assert!(r.is_expired(2_001));
        assert_eq!(r.remaining_ms(1_500), 500);
        assert_eq!(r.remaining_ms(9_999), 0);
    }

    proptest! {
        #[test]
        fn generated_codes_are_well_formed(seed in any::<u64>()) {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let code = generate_code(&mut rng);

            prop_assert_eq!(code.len(), 6);
            prop_assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)));
            // The phone-alphabet exclusions hold.
            prop_assert!(!code.contains(['0', 'O', '1', 'I', 'L']));
        }
    }
}
