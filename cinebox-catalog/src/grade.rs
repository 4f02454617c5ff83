use cinebox_core::{Seat, SeatGrade};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of seats per grade in one reservation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeCounts {
    pub adult: u32,
    pub teen: u32,
    pub preferential: u32,
}

impl GradeCounts {
    pub fn new(adult: u32, teen: u32, preferential: u32) -> Self {
        Self { adult, teen, preferential }
    }

    /// Tally the grades printed on the seats themselves
    pub fn from_seats<'a>(seats: impl IntoIterator<Item = &'a Seat>) -> Self {
        let mut counts = Self::default();
        for seat in seats {
            let slot = counts.slot(seat.grade);
            *slot = slot.saturating_add(1);
        }
        counts
    }

    /// Parse a client's grade choices, e.g. `{"adult": 2, "teen": 1}`.
    /// Unknown grade names are rejected.
    pub fn from_choices(choices: &HashMap<String, u32>) -> Result<Self, GradeError> {
        let mut counts = Self::default();
        for (name, count) in choices {
            let grade: SeatGrade = name
                .parse()
                .map_err(|_| GradeError::InvalidChoice(name.clone()))?;
            counts.add(grade, *count)?;
        }
        Ok(counts)
    }

    /// Same as `from_choices` but the counts must cover exactly `seat_count` seats
    pub fn from_choices_for(choices: &HashMap<String, u32>, seat_count: usize) -> Result<Self, GradeError> {
        let counts = Self::from_choices(choices)?;
        let actual = counts.total();
        if actual != seat_count as u64 {
            return Err(GradeError::CountMismatch {
                expected: seat_count,
                actual,
            });
        }
        Ok(counts)
    }

    pub fn get(&self, grade: SeatGrade) -> u32 {
        match grade {
            SeatGrade::Adult => self.adult,
            SeatGrade::Teen => self.teen,
            SeatGrade::Preferential => self.preferential,
        }
    }

    fn slot(&mut self, grade: SeatGrade) -> &mut u32 {
        match grade {
            SeatGrade::Adult => &mut self.adult,
            SeatGrade::Teen => &mut self.teen,
            SeatGrade::Preferential => &mut self.preferential,
        }
    }

    pub fn add(&mut self, grade: SeatGrade, count: u32) -> Result<(), GradeError> {
        let slot = self.slot(grade);
        *slot = slot
            .checked_add(count)
            .ok_or_else(|| GradeError::TooMany(grade.to_string()))?;
        Ok(())
    }

    /// Seats covered by all grades. Widened so three `u32` counts never overflow.
    pub fn total(&self) -> u64 {
        u64::from(self.adult) + u64::from(self.teen) + u64::from(self.preferential)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GradeError {
    #[error("Invalid grade choice '{0}', expected one of adult, teen, preferential")]
    InvalidChoice(String),

    #[error("Grade counts cover {actual} seats but {expected} seats were selected")]
    CountMismatch {
        expected: usize,
        actual: u64,
    },

    #[error("Too many '{0}' seats requested")]
    TooMany(String),
}
