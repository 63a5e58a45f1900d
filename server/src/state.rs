use std::sync::Arc;

use agent::manager::SessionManager;
use engine::config::AppConfig;
use engine::notify::ChangeNotifier;
use engine::service::ReservationService;

/// Shared handles cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReservationService>,
    pub sessions: Arc<SessionManager>,
    pub notifier: ChangeNotifier,
    pub cfg: Arc<AppConfig>,
}
