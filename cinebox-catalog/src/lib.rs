pub mod grade;
pub mod inventory;
pub mod pricing;
pub mod schedule;

pub use grade::{GradeCounts, GradeError};
pub use inventory::{SeatAvailability, SeatMap};
pub use pricing::{PriceTable, SavingRates};
pub use schedule::{CatalogError, MovieFilter, RegionCount, ScheduleListing, TheaterListing};
