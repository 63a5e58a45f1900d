//! The expiration sweeper: time-driven reclamation of lapsed holds.
//!
//! One coarse periodic sweep rather than per-reservation timers: the loop
//! survives restarts without state, tolerates clock adjustments, and its
//! worst-case lateness equals the tick, which is negligible against a
//! three-hour hold. The sweep itself lives in
//! `ReservationService::expire_due`; this module owns the cadence.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use common::time::now_ms;

use crate::metrics::Counters;
use crate::service::ReservationService;

pub struct ExpirationSweeper {
    service: Arc<ReservationService>,
    tick: Duration,
    counters: Counters,
}

impl ExpirationSweeper {
    pub fn new(service: Arc<ReservationService>, tick: Duration, counters: Counters) -> Self {
        Self {
            service,
            tick,
            counters,
        }
    }

    /// Spawn the sweep loop. Sweeps immediately to clear any backlog left
    /// by a crash, then on every tick; a tick that overruns is skipped, not
    /// queued. Returns the shutdown handle.
    pub fn spawn(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            info!(tick_secs = self.tick.as_secs(), "expiration sweeper started");

            let mut ticker = tokio::time::interval(self.tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
                        if let Err(e) = self.service.expire_due(now_ms()).await {
                            self.counters.sweep_failures.fetch_add(1, Ordering::Relaxed);
                            error!(error = %e, "expiration sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("expiration sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
