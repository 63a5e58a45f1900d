//! Live call session registry.
//!
//! Sessions are in-memory only. The manager bounds how many calls run at
//! once, hands out handles keyed by the bridge's session token, and reaps
//! sessions that have gone quiet past the idle timeout. A reaped or hung-up
//! session simply disappears; any tool call already in flight finishes and
//! commits on its own task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::{Mutex, watch};
use tracing::info;

use crate::intents::IntentClassifier;
use crate::session::CallSession;
use crate::tools::ToolRouter;

pub struct SessionHandle {
    pub id: String,
    session: Mutex<CallSession>,
    last_activity: RwLock<Instant>,
}

impl SessionHandle {
    fn new(session: CallSession) -> Self {
        Self {
            id: session.id().to_string(),
            session: Mutex::new(session),
            last_activity: RwLock::new(Instant::now()),
        }
    }

    pub async fn open(&self) -> String {
        self.touch();
        self.session.lock().await.open()
    }

    pub async fn handle_utterance(&self, utterance: &str) -> Vec<String> {
        self.touch();
        self.session.lock().await.handle_utterance(utterance).await
    }

    pub async fn is_ended(&self) -> bool {
        self.session.lock().await.is_ended()
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }
}

pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    tools: Arc<ToolRouter>,
    classifier: Arc<IntentClassifier>,

    max_sessions: usize,
    idle_timeout: Duration,
    hold_hours: u64,
}

impl SessionManager {
    pub fn new(
        tools: Arc<ToolRouter>,
        classifier: Arc<IntentClassifier>,
        max_sessions: usize,
        idle_timeout: Duration,
        hold_hours: u64,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            tools,
            classifier,
            max_sessions,
            idle_timeout,
            hold_hours,
        }
    }

    /// Register a session for an inbound call. The bridge's token is the
    /// identity; a reconnect with the same token resumes the same session.
    pub fn create(&self, token: &str) -> Option<Arc<SessionHandle>> {
        let mut sessions = self.sessions.write();

        if let Some(existing) = sessions.get(token) {
            return Some(existing.clone());
        }

        if sessions.len() >= self.max_sessions {
            self.reap_idle_locked(&mut sessions);
            if sessions.len() >= self.max_sessions {
                return None;
            }
        }

        let session = CallSession::new(
            token,
            self.tools.clone(),
            self.classifier.clone(),
            self.hold_hours,
        );
        let handle = Arc::new(SessionHandle::new(session));
        sessions.insert(token.to_string(), handle.clone());

        info!(call_id = %token, live = sessions.len(), "call session created");
        Some(handle)
    }

    pub fn get(&self, token: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(token).cloned()
    }

    /// Hangup: drop the session reference. In-flight tool calls complete on
    /// their own; conversational state is gone.
    pub fn remove(&self, token: &str) {
        if self.sessions.write().remove(token).is_some() {
            info!(call_id = %token, "call session removed");
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn reap_idle(&self) -> usize {
        let mut sessions = self.sessions.write();
        self.reap_idle_locked(&mut sessions)
    }

    fn reap_idle_locked(&self, sessions: &mut HashMap<String, Arc<SessionHandle>>) -> usize {
        let timeout = self.idle_timeout;
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.is_idle(timeout));
        let reaped = before - sessions.len();
        if reaped > 0 {
            info!(reaped, remaining = sessions.len(), "idle call sessions reaped");
        }
        reaped
    }

    /// Background reaper for sessions whose bridge never said goodbye.
    /// Returns the shutdown handle.
    pub fn start_reaper(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let interval = manager.idle_timeout;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.reap_idle();
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("session reaper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
