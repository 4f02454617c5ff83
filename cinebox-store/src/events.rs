use cinebox_shared::{SeatEvent, SeatEventKind};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// In-process fan-out of seat occupancy changes
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SeatEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SeatEvent) {
        // No subscribers is not an error
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!("Seat event delivered to {} subscribers", delivered);
    }

    pub fn seats_changed(&self, schedule_id: i64, seat_ids: &[i64], reservation_id: Uuid, kind: SeatEventKind) {
        self.publish(SeatEvent::new(schedule_id, seat_ids.to_vec(), reservation_id, kind));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
