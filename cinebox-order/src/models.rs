use chrono::{DateTime, Utc};
use cinebox_catalog::GradeCounts;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::ledger::HoldToken;

/// Reservation status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Seats held, waiting for payment
    Pending,
    Confirmed,
    Canceled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Canceled => "canceled",
        }
    }

    /// pending → confirmed → canceled, pending → canceled
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Pending, ReservationStatus::Confirmed)
                | (ReservationStatus::Pending, ReservationStatus::Canceled)
                | (ReservationStatus::Confirmed, ReservationStatus::Canceled)
        )
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "canceled" => Ok(ReservationStatus::Canceled),
            other => Err(format!("unknown reservation status '{}'", other)),
        }
    }
}

/// A reconciled gateway payment. Only ever mutated to mark cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub receipt_id: String,
    pub price: i64,
    pub discount_price: i64,
    pub paid_at: DateTime<Utc>,
    pub is_canceled: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(receipt_id: String, price: i64, discount_price: i64, paid_at: DateTime<Utc>) -> Self {
        Self {
            receipt_id,
            price,
            discount_price,
            paid_at,
            is_canceled: false,
            canceled_at: None,
        }
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.is_canceled = true;
        self.canceled_at = Some(at);
    }
}

/// Links a member, a schedule, a set of seats and (once paid) a payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: Uuid,
    pub member_id: i64,
    pub schedule_id: i64,
    pub seat_ids: Vec<i64>,
    pub grades: GradeCounts,
    /// Merchant order id handed to the payment gateway
    pub payment_id: String,
    pub hold: HoldToken,
    pub expected_total: i64,
    pub status: ReservationStatus,
    pub payment: Option<Payment>,
    pub reserved_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// A new pending reservation bound to a seat hold
    pub fn pending(member_id: i64, grades: GradeCounts, expected_total: i64, hold: HoldToken) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            member_id,
            schedule_id: hold.schedule_id,
            seat_ids: hold.seat_ids.clone(),
            grades,
            payment_id: payment_id_for(id),
            hold,
            expected_total,
            status: ReservationStatus::Pending,
            payment: None,
            reserved_at: Utc::now(),
            canceled_at: None,
        }
    }

    pub fn is_owned_by(&self, member_id: i64) -> bool {
        self.member_id == member_id
    }

    /// Pending and past its hold deadline
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.hold.is_expired(now)
    }

    /// Apply a confirmation in place. Returns `false` if not pending.
    pub fn apply_confirm(&mut self, payment: Payment) -> bool {
        if !self.status.can_transition_to(ReservationStatus::Confirmed) {
            return false;
        }
        self.status = ReservationStatus::Confirmed;
        self.payment = Some(payment);
        true
    }

    /// Apply a cancellation in place if the reservation is still in `from`
    pub fn apply_cancel(&mut self, from: ReservationStatus, at: DateTime<Utc>) -> bool {
        if self.status != from || !self.status.can_transition_to(ReservationStatus::Canceled) {
            return false;
        }
        self.status = ReservationStatus::Canceled;
        self.canceled_at = Some(at);
        if let Some(payment) = self.payment.as_mut() {
            payment.cancel(at);
        }
        true
    }
}

/// `rsv_` + simple uuid, e.g. `rsv_67e5504410b1426f9247bb680e5fe0c8`
pub fn payment_id_for(reservation_id: Uuid) -> String {
    format!("rsv_{}", reservation_id.simple())
}

/// Who is asking. Staff may act on any member's reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub member_id: i64,
    pub is_staff: bool,
}

impl Requester {
    pub fn member(member_id: i64) -> Self {
        Self { member_id, is_staff: false }
    }

    pub fn staff(member_id: i64) -> Self {
        Self { member_id, is_staff: true }
    }

    pub fn may_act_on(&self, reservation: &Reservation) -> bool {
        self.is_staff || reservation.is_owned_by(self.member_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hold() -> HoldToken {
        HoldToken {
            id: Uuid::new_v4(),
            schedule_id: 3,
            seat_ids: vec![1, 2],
            holder_id: 9,
            expires_at: Utc::now() + Duration::minutes(10),
        }
    }

    #[test]
    fn test_reservation_lifecycle() {
        let mut reservation = Reservation::pending(9, GradeCounts::new(2, 0, 0), 24000, hold());
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.schedule_id, 3);
        assert!(reservation.payment_id.starts_with("rsv_"));

        let now = Utc::now();
        assert!(reservation.apply_confirm(Payment::new("r-1".into(), 24000, 0, now)));
        assert_eq!(reservation.status, ReservationStatus::Confirmed);

        // Cannot confirm twice, cannot cancel from the wrong state
        assert!(!reservation.apply_confirm(Payment::new("r-2".into(), 24000, 0, now)));
        assert!(!reservation.apply_cancel(ReservationStatus::Pending, now));

        assert!(reservation.apply_cancel(ReservationStatus::Confirmed, now));
        assert_eq!(reservation.status, ReservationStatus::Canceled);
        assert!(reservation.payment.as_ref().unwrap().is_canceled);

        assert!(!reservation.apply_cancel(ReservationStatus::Canceled, now));
    }

    #[test]
    fn test_requester_authority() {
        let reservation = Reservation::pending(9, GradeCounts::new(2, 0, 0), 24000, hold());
        assert!(Requester::member(9).may_act_on(&reservation));
        assert!(!Requester::member(10).may_act_on(&reservation));
        assert!(Requester::staff(10).may_act_on(&reservation));
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [ReservationStatus::Pending, ReservationStatus::Confirmed, ReservationStatus::Canceled] {
            assert_eq!(status.as_str().parse::<ReservationStatus>().unwrap(), status);
        }
    }
}
