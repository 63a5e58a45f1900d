//! The tool boundary between the call session and the engine.
//!
//! Tools are the only way a session commits a side effect. Each tool
//! validates its own inputs (the session's slot values are conversation
//! text, never trusted), and every call runs under one uniform deadline
//! with a single silent retry on timeout. What survives the retry surfaces
//! to the session, which apologizes and degrades.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{instrument, warn};

use common::time::now_ms;
use engine::allocation::{Allocated, AllocationRequest};
use engine::chapel::{ChapelBooking, ChapelRequest, ChapelSchedule};
use engine::error::EngineError;
use engine::service::ReservationService;
use engine::volunteers::{VolunteerRecord, VolunteerRegistry, VolunteerRequest};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool call exceeded its deadline")]
    Timeout,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// The uniform deadline/retry policy: one deadline per attempt, one silent
/// retry on timeout. Engine errors pass straight through; the engine
/// already did its own bounded retrying where that is safe.
async fn bounded<T, F, Fut>(
    deadline: Duration,
    label: &'static str,
    mut call: F,
) -> Result<T, ToolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ToolError>>,
{
    for attempt in 0..2 {
        match tokio::time::timeout(deadline, call()).await {
            Ok(result) => return result,
            Err(_elapsed) => {
                warn!(tool = label, attempt, "tool call timed out");
            }
        }
    }
    Err(ToolError::Timeout)
}

pub struct ToolRouter {
    service: Arc<ReservationService>,
    chapel: Arc<ChapelSchedule>,
    volunteers: Arc<VolunteerRegistry>,
    deadline: Duration,
}

impl ToolRouter {
    pub fn new(
        service: Arc<ReservationService>,
        chapel: Arc<ChapelSchedule>,
        volunteers: Arc<VolunteerRegistry>,
        deadline: Duration,
    ) -> Self {
        Self {
            service,
            chapel,
            volunteers,
            deadline,
        }
    }

    /// Count of beds a caller could still take tonight.
    #[instrument(skip(self), target = "tools")]
    pub async fn check_availability(&self) -> Result<u32, ToolError> {
        bounded(self.deadline, "check_availability", || async {
            Ok(self.service.bed_counts().await?.available)
        })
        .await
    }

    /// Reserve the lowest available bed for the caller.
    #[instrument(skip(self, req), target = "tools", fields(caller = %req.caller_name))]
    pub async fn reserve_bed(&self, req: &AllocationRequest) -> Result<Allocated, ToolError> {
        if req.caller_name.trim().is_empty() {
            return Err(EngineError::validation("caller name is required").into());
        }

        bounded(self.deadline, "reserve_bed", || async {
            Ok(self.service.create(req, now_ms()).await?)
        })
        .await
    }

    #[instrument(skip(self, req), target = "tools", fields(date = %req.service_date))]
    pub async fn schedule_chapel_service(
        &self,
        req: &ChapelRequest,
    ) -> Result<ChapelBooking, ToolError> {
        bounded(self.deadline, "schedule_chapel_service", || async {
            Ok(self.chapel.schedule(req, now_ms()).await?)
        })
        .await
    }

    #[instrument(skip(self, req), target = "tools")]
    pub async fn register_volunteer(
        &self,
        req: &VolunteerRequest,
    ) -> Result<VolunteerRecord, ToolError> {
        bounded(self.deadline, "register_volunteer", || async {
            Ok(self.volunteers.register(req, now_ms()).await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn bounded_retries_once_then_times_out() {
        let attempts = Arc::new(AtomicU32::new(0));

        let counted = attempts.clone();
        let res: Result<u32, ToolError> = bounded(Duration::from_millis(50), "slow", move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            }
        })
        .await;

        assert!(matches!(res, Err(ToolError::Timeout)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_passes_fast_results_and_engine_errors_through() {
        let res: Result<u32, ToolError> =
            bounded(Duration::from_millis(50), "fast", || async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);

        let res: Result<u32, ToolError> = bounded(Duration::from_millis(50), "failing", || async {
            Err(EngineError::NoCapacity.into())
        })
        .await;
        assert!(matches!(res, Err(ToolError::Engine(EngineError::NoCapacity))));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_succeeds_when_the_retry_is_fast() {
        let attempts = Arc::new(AtomicU32::new(0));

        let counted = attempts.clone();
        let res: Result<u32, ToolError> = bounded(Duration::from_millis(50), "flaky", move || {
            let counted = counted.clone();
            async move {
                // First attempt hangs past the deadline, second returns.
                if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(9)
            }
        })
        .await;

        assert_eq!(res.unwrap(), 9);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
