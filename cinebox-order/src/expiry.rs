use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::ReservationError;
use crate::ledger::SeatLedger;
use crate::models::{Reservation, ReservationStatus};
use crate::repository::ReservationRepository;

/// Cancels pending reservations whose seat hold ran out
pub struct ExpirySweeper {
    reservations: Arc<dyn ReservationRepository>,
    ledger: Arc<dyn SeatLedger>,
}

impl ExpirySweeper {
    pub fn new(reservations: Arc<dyn ReservationRepository>, ledger: Arc<dyn SeatLedger>) -> Self {
        Self { reservations, ledger }
    }

    /// Returns the reservations this sweep canceled
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, ReservationError> {
        let expired = self.reservations.list_expired_holds(now).await?;
        let mut canceled = Vec::with_capacity(expired.len());

        for mut reservation in expired {
            match self
                .reservations
                .cancel(reservation.id, ReservationStatus::Pending, now)
                .await
            {
                Ok(true) => {}
                // Confirmed or canceled in the meantime
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!("Failed to expire reservation {}: {}", reservation.id, e);
                    continue;
                }
            }

            if let Err(e) = self.ledger.release(&reservation.hold).await {
                tracing::error!("Failed to release hold {}: {}", reservation.hold.id, e);
            }
            reservation.apply_cancel(ReservationStatus::Pending, now);
            canceled.push(reservation);
        }

        let purged = self.ledger.purge_expired(now).await?;
        if !canceled.is_empty() || purged > 0 {
            tracing::info!(
                "Expiry sweep canceled {} reservations, purged {} stale holds",
                canceled.len(),
                purged
            );
        }
        Ok(canceled)
    }
}
