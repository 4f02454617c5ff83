pub mod memory;
pub mod model;
pub mod payment;
pub mod repository;

pub use memory::InMemoryCatalog;
pub use model::{
    Member, MemberTier, Movie, Schedule, ScheduleDetail, Screen, Seat, SeatGrade, SeatType, Theater,
};
pub use payment::{MockReceiptVerifier, PaymentError, ReceiptStatus, ReceiptVerifier, VerifiedReceipt};
pub use repository::{MemberRepository, ScheduleRepository};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
}
