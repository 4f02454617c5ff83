use chrono::Utc;
use cinebox_core::{ReceiptVerifier, ScheduleRepository};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ReservationError;
use crate::ledger::SeatLedger;
use crate::models::{Requester, Reservation, ReservationStatus};
use crate::repository::ReservationRepository;
use crate::ReservationPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct CancelReservation {
    pub reservation_id: Uuid,
    /// Amount the client expects to be refunded
    #[serde(default)]
    pub price: Option<i64>,
}

/// Reverses a reservation: refunds the receipt if paid, then frees the seats
pub struct CancellationHandler {
    schedules: Arc<dyn ScheduleRepository>,
    reservations: Arc<dyn ReservationRepository>,
    ledger: Arc<dyn SeatLedger>,
    verifier: Arc<dyn ReceiptVerifier>,
    policy: ReservationPolicy,
}

impl CancellationHandler {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        reservations: Arc<dyn ReservationRepository>,
        ledger: Arc<dyn SeatLedger>,
        verifier: Arc<dyn ReceiptVerifier>,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            schedules,
            reservations,
            ledger,
            verifier,
            policy,
        }
    }

    pub async fn cancel(
        &self,
        requester: &Requester,
        req: CancelReservation,
    ) -> Result<Reservation, ReservationError> {
        let mut reservation = self
            .reservations
            .get(req.reservation_id)
            .await?
            .ok_or_else(|| ReservationError::InvalidReservationId(req.reservation_id.to_string()))?;

        if !requester.may_act_on(&reservation) {
            return Err(ReservationError::ReservationOwnership);
        }

        let from = reservation.status;
        if from == ReservationStatus::Canceled {
            return Err(ReservationError::InvalidReservationId(reservation.id.to_string()));
        }

        let now = Utc::now();
        let schedule = self
            .schedules
            .get_schedule(reservation.schedule_id)
            .await?
            .ok_or(ReservationError::InvalidScheduleId(reservation.schedule_id))?;
        if schedule.has_started(now) && !self.policy.allow_cancel_after_start {
            return Err(ReservationError::CancellationClosed);
        }

        if let Some(payment) = reservation.payment.as_ref().filter(|_| from == ReservationStatus::Confirmed) {
            if let Some(requested) = req.price {
                if requested != payment.price {
                    return Err(ReservationError::PriceNotMatching {
                        requested,
                        paid: payment.price,
                    });
                }
            }

            self.verifier
                .cancel(&payment.receipt_id, payment.price, "reservation canceled")
                .await
                .map_err(|e| {
                    tracing::error!("Refund for reservation {} failed: {}", reservation.id, e);
                    ReservationError::from(e)
                })?;
        }

        if !self.reservations.cancel(reservation.id, from, now).await? {
            tracing::warn!("Reservation {} changed state during cancel", reservation.id);
            return Err(ReservationError::InvalidReservationId(reservation.id.to_string()));
        }
        reservation.apply_cancel(from, now);

        if let Err(e) = self.ledger.release(&reservation.hold).await {
            tracing::error!("Failed to release seats of reservation {}: {}", reservation.id, e);
        }

        tracing::info!(
            "Reservation {} canceled by member {} (was {})",
            reservation.id,
            requester.member_id,
            from.as_str()
        );
        Ok(reservation)
    }
}
