use cinebox_catalog::GradeError;
use cinebox_core::PaymentError;
use uuid::Uuid;

use crate::ledger::LedgerError;

/// Client-facing reservation failures. Each one aborts only the current request.
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Seats already reserved: {seat_ids:?}")]
    SeatTaken { seat_ids: Vec<i64> },

    #[error("Invalid schedule: {0}")]
    InvalidScheduleId(i64),

    #[error("Invalid seat id: {0}")]
    InvalidSeatId(String),

    #[error("Seat {0} is blocked for distancing")]
    InvalidSeat(i64),

    #[error("Invalid grade choices: {0}")]
    InvalidGradeChoices(String),

    #[error("Receipt belongs to payment {receipt_order_id}, not {payment_id}")]
    PaymentIdReceiptIdNotMatching {
        payment_id: String,
        receipt_order_id: String,
    },

    #[error("Requested cancel amount {requested} differs from paid amount {paid}")]
    PriceNotMatching { requested: i64, paid: i64 },

    #[error("price + discount_price = {requested}, expected {expected}")]
    IncorrectPrice { expected: i64, requested: i64 },

    #[error("Receipt not verified: {0}")]
    UnverifiedReceipt(String),

    #[error("Failed to get payment gateway access token: {0}")]
    FailToGetAccessToken(String),

    #[error("Receipt verification request failed: {0}")]
    VerifyRequestFail(String),

    #[error("Reservation does not belong to the requester")]
    ReservationOwnership,

    #[error("Invalid reservation id: {0}")]
    InvalidReservationId(String),

    #[error("Payment cancel failed: {0}")]
    PaymentCancelFail(String),

    #[error("Seat hold {0} expired")]
    HoldExpired(Uuid),

    #[error("Reservations cannot be canceled after the screening has started")]
    CancellationClosed,

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl ReservationError {
    /// Stable machine-readable code of the error body
    pub fn code(&self) -> &'static str {
        match self {
            ReservationError::SeatTaken { .. } => "TakenSeat",
            ReservationError::InvalidScheduleId(_) => "InvalidScheduleID",
            ReservationError::InvalidSeatId(_) => "InvalidSeatId",
            ReservationError::InvalidSeat(_) => "InvalidSeat(sit_apart)",
            ReservationError::InvalidGradeChoices(_) => "InvalidGradeChoices",
            ReservationError::PaymentIdReceiptIdNotMatching { .. } => "PaymentIDReceiptIDNotMatching",
            ReservationError::PriceNotMatching { .. } => "PriceNotMatching",
            ReservationError::IncorrectPrice { .. } => "IncorrectPrice",
            ReservationError::UnverifiedReceipt(_) => "UnverifiedReceipt",
            ReservationError::FailToGetAccessToken(_) => "FailToGetBootPayAccessToken",
            ReservationError::VerifyRequestFail(_) => "VerifyRequestFail",
            ReservationError::ReservationOwnership => "ReservationOwnership",
            ReservationError::InvalidReservationId(_) => "InvalidReservationId",
            ReservationError::PaymentCancelFail(_) => "PaymentCancelFail",
            ReservationError::HoldExpired(_) => "HoldExpired",
            ReservationError::CancellationClosed => "CancellationClosed",
            ReservationError::Ledger(_) | ReservationError::Repository(_) => "InternalError",
        }
    }

    /// `false` for backend failures the client cannot fix
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ReservationError::Ledger(_) | ReservationError::Repository(_))
    }
}

impl From<LedgerError> for ReservationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::EmptySelection => ReservationError::InvalidSeatId("no seats selected".to_string()),
            LedgerError::SeatTaken { seat_ids } => ReservationError::SeatTaken { seat_ids },
            LedgerError::HoldNotActive(id) => ReservationError::HoldExpired(id),
            LedgerError::Backend(msg) => ReservationError::Ledger(msg),
        }
    }
}

impl From<GradeError> for ReservationError {
    fn from(err: GradeError) -> Self {
        ReservationError::InvalidGradeChoices(err.to_string())
    }
}

impl From<PaymentError> for ReservationError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::AccessToken(msg) => ReservationError::FailToGetAccessToken(msg),
            PaymentError::VerifyRequest(msg) => ReservationError::VerifyRequestFail(msg),
            PaymentError::CancelRequest(msg) => ReservationError::PaymentCancelFail(msg),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ReservationError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ReservationError::Repository(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_taxonomy() {
        let err: ReservationError = LedgerError::SeatTaken { seat_ids: vec![4] }.into();
        assert_eq!(err.code(), "TakenSeat");

        let err: ReservationError = LedgerError::EmptySelection.into();
        assert_eq!(err.code(), "InvalidSeatId");

        let err: ReservationError = LedgerError::Backend("redis down".into()).into();
        assert_eq!(err.code(), "InternalError");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_payment_errors_map_to_taxonomy() {
        let err: ReservationError = PaymentError::CancelRequest("timeout".into()).into();
        assert_eq!(err.code(), "PaymentCancelFail");

        let err: ReservationError = PaymentError::AccessToken("bad key".into()).into();
        assert_eq!(err.code(), "FailToGetBootPayAccessToken");
        assert!(err.is_client_error());
    }
}
