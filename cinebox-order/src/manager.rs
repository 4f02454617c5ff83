use chrono::Utc;
use cinebox_catalog::GradeCounts;
use cinebox_core::{ScheduleRepository, Seat};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ReservationError;
use crate::ledger::{normalize_seats, SeatLedger};
use crate::models::{Requester, Reservation};
use crate::repository::ReservationRepository;
use crate::ReservationPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservation {
    pub schedule_id: i64,
    pub seat_ids: Vec<i64>,
    /// Optional grade override, e.g. `{"adult": 1, "teen": 1}`
    #[serde(default)]
    pub grades: Option<HashMap<String, u32>>,
}

/// Validates seat selections and turns them into pending, held reservations
pub struct ReservationManager {
    schedules: Arc<dyn ScheduleRepository>,
    reservations: Arc<dyn ReservationRepository>,
    ledger: Arc<dyn SeatLedger>,
    policy: ReservationPolicy,
}

impl ReservationManager {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        reservations: Arc<dyn ReservationRepository>,
        ledger: Arc<dyn SeatLedger>,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            schedules,
            reservations,
            ledger,
            policy,
        }
    }

    /// Hold the requested seats and record a pending reservation
    pub async fn create_reservation(
        &self,
        member_id: i64,
        req: CreateReservation,
    ) -> Result<Reservation, ReservationError> {
        // 1. Schedule must exist and not have started
        let schedule = self
            .schedules
            .get_schedule(req.schedule_id)
            .await?
            .ok_or(ReservationError::InvalidScheduleId(req.schedule_id))?;

        if schedule.has_started(Utc::now()) {
            return Err(ReservationError::InvalidScheduleId(req.schedule_id));
        }

        // 2. Seats must belong to the schedule's screen and be reservable
        let seat_ids = normalize_seats(&req.seat_ids);
        if seat_ids.is_empty() {
            return Err(ReservationError::InvalidSeatId("no seats selected".to_string()));
        }

        let screen_seats = self.schedules.list_seats(schedule.screen.id).await?;
        let by_id: HashMap<i64, &Seat> = screen_seats.iter().map(|s| (s.id, s)).collect();

        let unknown: Vec<String> = seat_ids
            .iter()
            .filter(|id| !by_id.contains_key(id))
            .map(|id| id.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(ReservationError::InvalidSeatId(unknown.join(",")));
        }

        let selected: Vec<&Seat> = seat_ids.iter().filter_map(|id| by_id.get(id).copied()).collect();
        if let Some(blocked) = selected.iter().find(|s| !s.is_reservable()) {
            return Err(ReservationError::InvalidSeat(blocked.id));
        }

        // 3. Grades: explicit choices or the seats' own grades
        let grades = match &req.grades {
            Some(choices) => GradeCounts::from_choices_for(choices, seat_ids.len())?,
            None => GradeCounts::from_seats(selected.iter().copied()),
        };
        let expected_total = self.policy.prices.total(&grades);

        // 4. Take the hold
        let hold = self
            .ledger
            .try_hold(schedule.id(), &seat_ids, member_id, self.policy.hold_ttl)
            .await
            .map_err(|e| {
                tracing::info!("Hold rejected for member {} on schedule {}: {}", member_id, schedule.id(), e);
                ReservationError::from(e)
            })?;

        // 5. Persist, giving the seats back if that fails
        let reservation = Reservation::pending(member_id, grades, expected_total, hold);
        if let Err(e) = self.reservations.insert(&reservation).await {
            tracing::error!("Failed to persist reservation {}: {}", reservation.id, e);
            if let Err(release_err) = self.ledger.release(&reservation.hold).await {
                tracing::error!("Failed to roll back hold {}: {}", reservation.hold.id, release_err);
            }
            return Err(e.into());
        }

        tracing::info!(
            "Reservation {} pending for member {}: schedule {} seats {:?} total {}",
            reservation.id,
            member_id,
            reservation.schedule_id,
            reservation.seat_ids,
            expected_total
        );
        Ok(reservation)
    }

    /// Fetch a reservation the requester is allowed to see
    pub async fn get_reservation(
        &self,
        requester: &Requester,
        id: Uuid,
    ) -> Result<Reservation, ReservationError> {
        let reservation = self
            .reservations
            .get(id)
            .await?
            .ok_or_else(|| ReservationError::InvalidReservationId(id.to_string()))?;

        if !requester.may_act_on(&reservation) {
            return Err(ReservationError::ReservationOwnership);
        }
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, PAST_SCHEDULE, SCHEDULE, SEAT_A, SEAT_B, SEAT_C, SEAT_SIT_APART, SEAT_TEEN};
    use crate::models::ReservationStatus;

    fn request(seat_ids: Vec<i64>) -> CreateReservation {
        CreateReservation {
            schedule_id: SCHEDULE,
            seat_ids,
            grades: None,
        }
    }

    #[tokio::test]
    async fn test_create_pending_reservation() {
        let fx = Fixture::new().await;
        let reservation = fx.manager.create_reservation(1, request(vec![SEAT_B, SEAT_A, SEAT_TEEN])).await.unwrap();

        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.seat_ids, vec![SEAT_A, SEAT_B, SEAT_TEEN]);
        assert_eq!(reservation.grades, GradeCounts::new(2, 1, 0));
        assert_eq!(reservation.expected_total, 34000);
        assert_eq!(fx.ledger.occupied(SCHEDULE).await.unwrap(), vec![SEAT_A, SEAT_B, SEAT_TEEN]);
        assert!(fx.reservations.get(reservation.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_taken_seat() {
        let fx = Fixture::new().await;
        fx.manager.create_reservation(1, request(vec![SEAT_A, SEAT_B])).await.unwrap();

        let err = fx.manager.create_reservation(2, request(vec![SEAT_B, SEAT_C])).await.unwrap_err();
        assert!(matches!(err, ReservationError::SeatTaken { ref seat_ids } if seat_ids == &vec![SEAT_B]));
        // SEAT_C was not left half-held
        assert_eq!(fx.ledger.occupied(SCHEDULE).await.unwrap(), vec![SEAT_A, SEAT_B]);
    }

    #[tokio::test]
    async fn test_invalid_schedule() {
        let fx = Fixture::new().await;
        let mut req = request(vec![SEAT_A]);
        req.schedule_id = 999;
        assert_eq!(fx.manager.create_reservation(1, req).await.unwrap_err().code(), "InvalidScheduleID");

        let mut req = request(vec![SEAT_A]);
        req.schedule_id = PAST_SCHEDULE;
        assert_eq!(fx.manager.create_reservation(1, req).await.unwrap_err().code(), "InvalidScheduleID");
    }

    #[tokio::test]
    async fn test_invalid_seats() {
        let fx = Fixture::new().await;
        let err = fx.manager.create_reservation(1, request(vec![SEAT_A, 4242])).await.unwrap_err();
        assert_eq!(err.code(), "InvalidSeatId");

        let err = fx.manager.create_reservation(1, request(vec![])).await.unwrap_err();
        assert_eq!(err.code(), "InvalidSeatId");

        let err = fx.manager.create_reservation(1, request(vec![SEAT_SIT_APART])).await.unwrap_err();
        assert_eq!(err.code(), "InvalidSeat(sit_apart)");

        assert!(fx.ledger.occupied(SCHEDULE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_grade_choices() {
        let fx = Fixture::new().await;

        let mut req = request(vec![SEAT_A, SEAT_B]);
        req.grades = Some(HashMap::from([("adult".to_string(), 1), ("preferential".to_string(), 1)]));
        let reservation = fx.manager.create_reservation(1, req).await.unwrap();
        assert_eq!(reservation.expected_total, 17000);

        let mut req = request(vec![SEAT_C]);
        req.grades = Some(HashMap::from([("child".to_string(), 1)]));
        assert_eq!(fx.manager.create_reservation(1, req).await.unwrap_err().code(), "InvalidGradeChoices");

        let mut req = request(vec![SEAT_C]);
        req.grades = Some(HashMap::from([("adult".to_string(), 2)]));
        assert_eq!(fx.manager.create_reservation(1, req).await.unwrap_err().code(), "InvalidGradeChoices");
    }

    #[tokio::test]
    async fn test_oversized_grade_counts_rejected() {
        let fx = Fixture::new().await;

        let mut req = request(vec![SEAT_A]);
        req.grades = Some(HashMap::from([("adult".to_string(), u32::MAX), ("teen".to_string(), 2)]));
        let err = fx.manager.create_reservation(1, req).await.unwrap_err();
        assert_eq!(err.code(), "InvalidGradeChoices");

        assert!(fx.ledger.occupied(SCHEDULE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_reservation_ownership() {
        let fx = Fixture::new().await;
        let reservation = fx.manager.create_reservation(1, request(vec![SEAT_A])).await.unwrap();

        assert!(fx.manager.get_reservation(&Requester::member(1), reservation.id).await.is_ok());
        assert_eq!(
            fx.manager.get_reservation(&Requester::member(2), reservation.id).await.unwrap_err().code(),
            "ReservationOwnership"
        );
        assert!(fx.manager.get_reservation(&Requester::staff(2), reservation.id).await.is_ok());
        assert_eq!(
            fx.manager.get_reservation(&Requester::member(1), Uuid::new_v4()).await.unwrap_err().code(),
            "InvalidReservationId"
        );
    }
}
