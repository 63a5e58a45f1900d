use serde::{Deserialize, Serialize};

use engine::allocation::Allocated;

#[derive(Debug, Deserialize)]
pub struct CreateReservationBody {
    pub caller_name: String,
    #[serde(default)]
    pub situation: String,
    #[serde(default)]
    pub needs: String,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HoldBody {
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub guest_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckinQuery {
    pub reservation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceQuery {
    #[serde(default)]
    pub session: String,
}

/// Inbound chat frame on the dashboard socket.
#[derive(Debug, Deserialize)]
pub struct ChatFrame {
    pub sender: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct ReservationCreatedResponse {
    pub code: String,
    pub bed_id: u16,
    pub expires_at_ms: u64,
    pub status: &'static str,
}

impl From<Allocated> for ReservationCreatedResponse {
    fn from(a: Allocated) -> Self {
        Self {
            code: a.code,
            bed_id: a.bed_id,
            expires_at_ms: a.expires_at_ms,
            status: "active",
        }
    }
}
