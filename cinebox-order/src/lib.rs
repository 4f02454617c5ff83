pub mod cancellation;
pub mod error;
pub mod expiry;
pub mod history;
pub mod ledger;
pub mod manager;
pub mod models;
pub mod reconciler;
pub mod repository;

#[cfg(test)]
mod fixtures;

use chrono::Duration;
use cinebox_catalog::{PriceTable, SavingRates};

pub use cancellation::{CancelReservation, CancellationHandler};
pub use error::ReservationError;
pub use expiry::ExpirySweeper;
pub use history::{HistoryEntry, HistoryFilter, HistorySummary, ReservationHistory};
pub use ledger::{HoldToken, InMemorySeatLedger, LedgerError, SeatLedger};
pub use manager::{CreateReservation, ReservationManager};
pub use models::{Payment, Requester, Reservation, ReservationStatus};
pub use reconciler::{Confirmation, ConfirmPayment, PaymentReconciler};
pub use repository::{InMemoryReservationRepository, ReservationRepository};

/// Business rules shared by the reservation handlers
#[derive(Debug, Clone)]
pub struct ReservationPolicy {
    /// How long a seat hold waits for payment
    pub hold_ttl: Duration,
    pub allow_cancel_after_start: bool,
    pub prices: PriceTable,
    pub saving_rates: SavingRates,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::minutes(10),
            allow_cancel_after_start: false,
            prices: PriceTable::default(),
            saving_rates: SavingRates::default(),
        }
    }
}
