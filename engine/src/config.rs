use std::time::Duration;

use crate::error::EngineError;

/// Total number of physical beds. Fixed by the building, not by config;
/// startup refuses to run against a database that disagrees.
pub const TOTAL_BEDS: u16 = 108;

/// Chapel services start at these times only.
pub const CHAPEL_TIME_SLOTS: [&str; 3] = ["10:00", "13:00", "19:00"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// HTTP listen address.
    pub bind_addr: String,

    // =========================
    // Reservation lifecycle
    // =========================
    /// How long a hold keeps a bed before the sweeper reclaims it.
    pub hold_duration: Duration,

    /// Sweeper cadence. Bounds expiration lateness; must stay at or below
    /// 60s so a lapsed hold never outlives its bed by more than a minute.
    pub expiration_tick: Duration,

    /// Attempts the allocator makes when racing writers keep winning the
    /// same bed before it reports `conflict`.
    pub allocation_retry_max: u32,

    // =========================
    // Call sessions
    // =========================
    /// A call with no utterance for this long is reaped.
    pub idle_session_timeout: Duration,

    /// Per-tool-call deadline enforced by the tool router.
    pub tool_call_deadline: Duration,

    /// Upper bound on simultaneous voice calls.
    pub max_call_sessions: usize,

    // =========================
    // Dashboards
    // =========================
    /// Broadcast buffer per the notifier; a subscriber lagging past this
    /// many events must resnapshot.
    pub notifier_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://shelter.db?mode=rwc".to_string());
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        Self {
            database_url,
            bind_addr,

            hold_duration: duration_from_env_secs("HOLD_DURATION_SECS", 3 * 60 * 60),
            expiration_tick: duration_from_env_secs("EXPIRATION_TICK_SECS", 30),
            allocation_retry_max: 8,

            idle_session_timeout: duration_from_env_secs("IDLE_SESSION_TIMEOUT_SECS", 20),
            tool_call_deadline: duration_from_env_secs("TOOL_CALL_DEADLINE_SECS", 10),
            max_call_sessions: 64,

            notifier_capacity: 256,
        }
    }

    /// Rejects configurations that would silently weaken the lifecycle
    /// guarantees. Called once at startup; failure is fatal.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.expiration_tick > Duration::from_secs(60) {
            return Err(EngineError::validation(format!(
                "expiration_tick must be <= 60s, got {}s",
                self.expiration_tick.as_secs()
            )));
        }
        if self.hold_duration <= self.expiration_tick {
            return Err(EngineError::validation(
                "hold_duration must exceed expiration_tick",
            ));
        }
        if self.allocation_retry_max == 0 {
            return Err(EngineError::validation("allocation_retry_max must be >= 1"));
        }
        Ok(())
    }
}

fn duration_from_env_secs(key: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            bind_addr: "127.0.0.1:0".into(),
            hold_duration: Duration::from_secs(3 * 60 * 60),
            expiration_tick: Duration::from_secs(30),
            allocation_retry_max: 8,
            idle_session_timeout: Duration::from_secs(20),
            tool_call_deadline: Duration::from_secs(10),
            max_call_sessions: 64,
            notifier_capacity: 256,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_slow_expiration_tick() {
        let mut cfg = base();
        cfg.expiration_tick = Duration::from_secs(61);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_hold_shorter_than_tick() {
        let mut cfg = base();
        cfg.hold_duration = Duration::from_secs(10);
        assert!(cfg.validate().is_err());
    }
}
