pub mod events;
pub mod pii;

pub use events::{SeatEvent, SeatEventKind};
pub use pii::Masked;
