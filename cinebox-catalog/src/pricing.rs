use cinebox_core::{MemberTier, SeatGrade};
use serde::{Deserialize, Serialize};

use crate::grade::GradeCounts;

/// Ticket price per seat grade, in won
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceTable {
    pub adult: i64,
    pub teen: i64,
    pub preferential: i64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            adult: 12000,
            teen: 10000,
            preferential: 5000,
        }
    }
}

impl PriceTable {
    pub fn price_of(&self, grade: SeatGrade) -> i64 {
        match grade {
            SeatGrade::Adult => self.adult,
            SeatGrade::Teen => self.teen,
            SeatGrade::Preferential => self.preferential,
        }
    }

    /// Amount a reservation with these grade counts must pay (before discounts)
    pub fn total(&self, counts: &GradeCounts) -> i64 {
        SeatGrade::ALL
            .iter()
            .map(|grade| self.price_of(*grade).saturating_mul(i64::from(counts.get(*grade))))
            .fold(0, i64::saturating_add)
    }
}

/// Point accrual rates in per-mille of the amount actually charged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavingRates {
    pub basic: i64,
    pub vip: i64,
}

impl Default for SavingRates {
    fn default() -> Self {
        Self { basic: 10, vip: 20 }
    }
}

impl SavingRates {
    pub fn rate_for(&self, tier: MemberTier) -> i64 {
        match tier {
            MemberTier::Basic => self.basic,
            MemberTier::Vip => self.vip,
        }
    }

    /// Points earned on a payment. Rounds half up.
    pub fn saving_point(&self, tier: MemberTier, price: i64, discount_price: i64) -> i64 {
        let charged = (price - discount_price).max(0);
        (charged * self.rate_for(tier) + 500) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_by_grade() {
        let table = PriceTable::default();
        assert_eq!(table.total(&GradeCounts::new(2, 1, 0)), 34000);
        assert_eq!(table.total(&GradeCounts::new(0, 0, 3)), 15000);
        assert_eq!(table.total(&GradeCounts::default()), 0);
    }

    #[test]
    fn test_saving_point_by_tier() {
        let rates = SavingRates::default();
        assert_eq!(rates.saving_point(MemberTier::Basic, 24000, 0), 240);
        assert_eq!(rates.saving_point(MemberTier::Vip, 24000, 2000), 440);
        // 1% of 12050 = 120.5 rounds up
        assert_eq!(rates.saving_point(MemberTier::Basic, 12050, 0), 121);
        // Fully discounted tickets earn nothing
        assert_eq!(rates.saving_point(MemberTier::Vip, 5000, 6000), 0);
    }
}
