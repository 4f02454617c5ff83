use cinebox_core::{Seat, SeatGrade, SeatType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One seat of a schedule's seat map
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatAvailability {
    pub seat_id: i64,
    pub seat_name: String,
    pub grade: SeatGrade,
    pub seat_type: SeatType,
    pub available: bool,
}

/// Seat map of a schedule: every seat of the screen with its current availability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMap {
    /// Reservable (general) seats on the screen
    pub total_seats: usize,
    /// Seats currently held or confirmed
    pub reserved_seats: usize,
    pub seats: Vec<SeatAvailability>,
}

impl SeatMap {
    pub fn build(seats: &[Seat], occupied: &[i64]) -> Self {
        let occupied: HashSet<i64> = occupied.iter().copied().collect();

        let seats: Vec<SeatAvailability> = seats
            .iter()
            .map(|seat| SeatAvailability {
                seat_id: seat.id,
                seat_name: seat.name.clone(),
                grade: seat.grade,
                seat_type: seat.seat_type,
                available: seat.is_reservable() && !occupied.contains(&seat.id),
            })
            .collect();

        let total_seats = seats.iter().filter(|s| s.seat_type == SeatType::General).count();
        let reserved_seats = seats.iter().filter(|s| occupied.contains(&s.seat_id)).count();

        Self {
            total_seats,
            reserved_seats,
            seats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(id: i64, seat_type: SeatType) -> Seat {
        Seat {
            id,
            screen_id: 7,
            name: format!("B{}", id),
            grade: SeatGrade::Adult,
            seat_type,
        }
    }

    #[test]
    fn test_seat_map_counts() {
        let seats = vec![
            seat(1, SeatType::General),
            seat(2, SeatType::SitApart),
            seat(3, SeatType::General),
            seat(4, SeatType::General),
        ];

        let map = SeatMap::build(&seats, &[3]);
        assert_eq!(map.total_seats, 3);
        assert_eq!(map.reserved_seats, 1);
        assert!(!map.seats[2].available);

        // Sit-apart seats are never available
        assert!(!map.seats[1].available);
        assert!(map.seats[0].available);
    }
}
