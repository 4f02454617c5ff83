use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatEventKind {
    Held,
    Confirmed,
    Released,
}

/// Seat occupancy change on one schedule, fanned out to SSE subscribers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeatEvent {
    pub schedule_id: i64,
    pub seat_ids: Vec<i64>,
    pub reservation_id: Uuid,
    pub kind: SeatEventKind,
    pub at: DateTime<Utc>,
}

impl SeatEvent {
    pub fn new(schedule_id: i64, seat_ids: Vec<i64>, reservation_id: Uuid, kind: SeatEventKind) -> Self {
        Self {
            schedule_id,
            seat_ids,
            reservation_id,
            kind,
            at: Utc::now(),
        }
    }

    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            SeatEventKind::Held => "seat_held",
            SeatEventKind::Confirmed => "seat_confirmed",
            SeatEventKind::Released => "seat_released",
        }
    }
}
