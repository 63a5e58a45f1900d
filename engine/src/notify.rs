//! Change notifier: fan-out of state transitions to dashboard sockets.
//!
//! Delivery is best-effort. The notifier sits strictly after the owning
//! transaction commits and never blocks it; a subscriber that lags past the
//! buffer sees `Lagged`, resnapshots through the service, and continues.

use tokio::sync::broadcast;
use serde::{Deserialize, Serialize};

use crate::beds::BedStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ChangeEvent {
    #[serde(rename = "bed.status_changed")]
    BedStatusChanged {
        bed_id: u16,
        from: BedStatus,
        to: BedStatus,
    },

    #[serde(rename = "reservation.created")]
    ReservationCreated {
        code: String,
        bed_id: u16,
        expires_at_ms: u64,
    },

    #[serde(rename = "reservation.cancelled")]
    ReservationCancelled { code: String, bed_id: u16 },

    #[serde(rename = "reservation.expired")]
    ReservationExpired { code: String, bed_id: u16 },

    #[serde(rename = "reservation.checked_in")]
    ReservationCheckedIn { code: String, bed_id: u16 },

    /// Staff chat relayed between dashboard sockets.
    #[serde(rename = "chat.message")]
    ChatMessage {
        sender: String,
        body: String,
        sent_at_ms: u64,
    },
}

#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish one event. A send with zero subscribers is a no-op, not an
    /// error; dashboards come and go.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for ev in events {
            self.publish(ev);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let notifier = ChangeNotifier::new(16);
        let mut rx = notifier.subscribe();

        notifier.publish(ChangeEvent::BedStatusChanged {
            bed_id: 1,
            from: BedStatus::Available,
            to: BedStatus::Held,
        });

        match rx.recv().await.unwrap() {
            ChangeEvent::BedStatusChanged { bed_id, from, to } => {
                assert_eq!(bed_id, 1);
                assert_eq!(from, BedStatus::Available);
                assert_eq!(to, BedStatus::Held);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let notifier = ChangeNotifier::new(16);
        notifier.publish(ChangeEvent::ReservationCancelled {
            code: "AAAAAA".into(),
            bed_id: 3,
        });
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_observes_lagged_then_continues() {
        let notifier = ChangeNotifier::new(16);
        let mut rx = notifier.subscribe();

        for i in 0..40u16 {
            notifier.publish(ChangeEvent::ReservationExpired {
                code: format!("CODE{i:02}"),
                bed_id: 1,
            });
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert!(missed > 0),
            other => panic!("expected lag, got {other:?}"),
        }
        // Subsequent reads resume from the retained tail.
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn events_serialize_with_dotted_tags() {
        let json = serde_json::to_value(ChangeEvent::ReservationCreated {
            code: "AB23CD".into(),
            bed_id: 5,
            expires_at_ms: 42,
        })
        .unwrap();
        assert_eq!(json["event"], "reservation.created");
        assert_eq!(json["bed_id"], 5);
    }
}
