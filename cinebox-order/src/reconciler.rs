use chrono::Utc;
use cinebox_core::{MemberRepository, MemberTier, ReceiptVerifier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ReservationError;
use crate::ledger::{LedgerError, SeatLedger};
use crate::models::{Payment, Reservation, ReservationStatus};
use crate::repository::ReservationRepository;
use crate::ReservationPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPayment {
    pub reservation_id: Uuid,
    pub receipt_id: String,
    /// Amount actually charged by the gateway
    pub price: i64,
    #[serde(default)]
    pub discount_price: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Confirmation {
    pub reservation: Reservation,
    pub saving_point: i64,
}

/// Matches a gateway receipt to a pending reservation and confirms it
pub struct PaymentReconciler {
    reservations: Arc<dyn ReservationRepository>,
    ledger: Arc<dyn SeatLedger>,
    verifier: Arc<dyn ReceiptVerifier>,
    members: Arc<dyn MemberRepository>,
    policy: ReservationPolicy,
}

impl PaymentReconciler {
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        ledger: Arc<dyn SeatLedger>,
        verifier: Arc<dyn ReceiptVerifier>,
        members: Arc<dyn MemberRepository>,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            reservations,
            ledger,
            verifier,
            members,
            policy,
        }
    }

    pub async fn confirm_payment(
        &self,
        requester_id: i64,
        req: ConfirmPayment,
    ) -> Result<Confirmation, ReservationError> {
        let mut reservation = self
            .reservations
            .get(req.reservation_id)
            .await?
            .ok_or_else(|| ReservationError::InvalidReservationId(req.reservation_id.to_string()))?;

        if !reservation.is_owned_by(requester_id) {
            return Err(ReservationError::ReservationOwnership);
        }
        if reservation.status != ReservationStatus::Pending {
            return Err(ReservationError::InvalidReservationId(reservation.id.to_string()));
        }

        let now = Utc::now();
        if reservation.hold.is_expired(now) {
            self.abandon(&reservation).await;
            return Err(ReservationError::HoldExpired(reservation.hold.id));
        }

        let requested = match req.price.checked_add(req.discount_price) {
            Some(sum) if req.price >= 0 && req.discount_price >= 0 => sum,
            _ => {
                tracing::warn!(
                    "Reservation {}: rejected amounts price {} discount {}",
                    reservation.id,
                    req.price,
                    req.discount_price
                );
                return Err(ReservationError::IncorrectPrice {
                    expected: reservation.expected_total,
                    requested: req.price.saturating_add(req.discount_price),
                });
            }
        };
        if requested != reservation.expected_total {
            tracing::warn!(
                "Reservation {}: price {} + discount {} does not match expected {}",
                reservation.id,
                req.price,
                req.discount_price,
                reservation.expected_total
            );
            return Err(ReservationError::IncorrectPrice {
                expected: reservation.expected_total,
                requested,
            });
        }

        let receipt = self.verifier.verify(&req.receipt_id).await?;
        if receipt.order_id != reservation.payment_id {
            return Err(ReservationError::PaymentIdReceiptIdNotMatching {
                payment_id: reservation.payment_id.clone(),
                receipt_order_id: receipt.order_id,
            });
        }
        if !receipt.is_completed() || receipt.price != req.price {
            return Err(ReservationError::UnverifiedReceipt(format!(
                "receipt {} status {:?} amount {}",
                receipt.receipt_id, receipt.status, receipt.price
            )));
        }

        if let Err(e) = self.ledger.confirm(&reservation.hold).await {
            return Err(match e {
                LedgerError::HoldNotActive(hold_id) => {
                    self.refund(&req.receipt_id, req.price, "seat hold expired").await;
                    self.abandon(&reservation).await;
                    ReservationError::HoldExpired(hold_id)
                }
                other => other.into(),
            });
        }

        let payment = Payment::new(
            req.receipt_id.clone(),
            req.price,
            req.discount_price,
            receipt.paid_at.unwrap_or(now),
        );
        match self.reservations.confirm(reservation.id, &payment).await {
            Ok(true) => {}
            Ok(false) => {
                // Lost to a concurrent cancel or expiry; that path owns the seats now
                tracing::warn!("Reservation {} changed state during payment, refunding", reservation.id);
                self.refund(&req.receipt_id, req.price, "reservation no longer pending").await;
                return Err(ReservationError::InvalidReservationId(reservation.id.to_string()));
            }
            Err(e) => {
                tracing::error!("Failed to persist confirmation of reservation {}: {}", reservation.id, e);
                self.refund(&req.receipt_id, req.price, "reservation could not be confirmed").await;
                if let Err(release_err) = self.ledger.release(&reservation.hold).await {
                    tracing::error!("Failed to release hold {}: {}", reservation.hold.id, release_err);
                }
                // Best effort; the expiry sweep retries once the hold has run out
                if let Err(cancel_err) = self
                    .reservations
                    .cancel(reservation.id, ReservationStatus::Pending, Utc::now())
                    .await
                {
                    tracing::error!("Failed to cancel reservation {}: {}", reservation.id, cancel_err);
                }
                return Err(e.into());
            }
        }
        reservation.apply_confirm(payment);

        let tier = self.member_tier(requester_id).await;
        let saving_point = self
            .policy
            .saving_rates
            .saving_point(tier, req.price, req.discount_price);

        tracing::info!(
            "Reservation {} confirmed with receipt {} ({} won, {} points)",
            reservation.id,
            req.receipt_id,
            req.price,
            saving_point
        );
        Ok(Confirmation {
            reservation,
            saving_point,
        })
    }

    /// Cancel a pending reservation whose hold ran out and give its seats back
    async fn abandon(&self, reservation: &Reservation) {
        match self
            .reservations
            .cancel(reservation.id, ReservationStatus::Pending, Utc::now())
            .await
        {
            Ok(true) => {
                if let Err(e) = self.ledger.release(&reservation.hold).await {
                    tracing::error!("Failed to release hold {}: {}", reservation.hold.id, e);
                }
                tracing::info!("Reservation {} canceled, hold expired", reservation.id);
            }
            Ok(false) => {}
            Err(e) => tracing::error!("Failed to cancel expired reservation {}: {}", reservation.id, e),
        }
    }

    async fn refund(&self, receipt_id: &str, amount: i64, reason: &str) {
        if let Err(e) = self.verifier.cancel(receipt_id, amount, reason).await {
            tracing::error!("Refund of receipt {} failed: {}", receipt_id, e);
        }
    }

    async fn member_tier(&self, member_id: i64) -> MemberTier {
        match self.members.get_member(member_id).await {
            Ok(Some(member)) => member.tier,
            Ok(None) => {
                tracing::warn!("Member {} not found, using BASIC saving rate", member_id);
                MemberTier::Basic
            }
            Err(e) => {
                tracing::warn!("Member {} lookup failed, using BASIC saving rate: {}", member_id, e);
                MemberTier::Basic
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, BASIC_MEMBER, SCHEDULE, SEAT_A, SEAT_B, VIP_MEMBER};
    use crate::repository::InMemoryReservationRepository;
    use async_trait::async_trait;
    use chrono::DateTime;
    use cinebox_core::{ReceiptStatus, VerifiedReceipt};

    type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

    /// Delegates to the in-memory store but cannot persist confirmations
    struct ConfirmFails(Arc<InMemoryReservationRepository>);

    #[async_trait]
    impl ReservationRepository for ConfirmFails {
        async fn insert(&self, reservation: &Reservation) -> RepoResult<()> {
            self.0.insert(reservation).await
        }

        async fn get(&self, id: Uuid) -> RepoResult<Option<Reservation>> {
            self.0.get(id).await
        }

        async fn confirm(&self, _id: Uuid, _payment: &Payment) -> RepoResult<bool> {
            Err("connection reset".into())
        }

        async fn cancel(&self, id: Uuid, from: ReservationStatus, at: DateTime<Utc>) -> RepoResult<bool> {
            self.0.cancel(id, from, at).await
        }

        async fn list_by_member(&self, member_id: i64) -> RepoResult<Vec<Reservation>> {
            self.0.list_by_member(member_id).await
        }

        async fn list_expired_holds(&self, now: DateTime<Utc>) -> RepoResult<Vec<Reservation>> {
            self.0.list_expired_holds(now).await
        }
    }

    fn confirm(reservation: &Reservation, receipt_id: &str, price: i64, discount_price: i64) -> ConfirmPayment {
        ConfirmPayment {
            reservation_id: reservation.id,
            receipt_id: receipt_id.to_string(),
            price,
            discount_price,
        }
    }

    #[tokio::test]
    async fn test_confirm_payment() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A, SEAT_B]).await;
        fx.verifier.register_completed("r-1", &reservation.payment_id, 20000).await;

        let confirmation = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", 20000, 4000))
            .await
            .unwrap();

        assert_eq!(confirmation.reservation.status, ReservationStatus::Confirmed);
        assert_eq!(confirmation.saving_point, 160);
        let stored = fx.reservations.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Confirmed);
        assert_eq!(stored.payment.unwrap().receipt_id, "r-1");
    }

    #[tokio::test]
    async fn test_vip_saving_rate() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(VIP_MEMBER, vec![SEAT_A]).await;
        fx.verifier.register_completed("r-vip", &reservation.payment_id, 12000).await;

        let confirmation = fx
            .reconciler
            .confirm_payment(VIP_MEMBER, confirm(&reservation, "r-vip", 12000, 0))
            .await
            .unwrap();
        assert_eq!(confirmation.saving_point, 240);
    }

    #[tokio::test]
    async fn test_incorrect_price() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A, SEAT_B]).await;
        fx.verifier.register_completed("r-1", &reservation.payment_id, 20000).await;

        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", 20000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::IncorrectPrice { expected: 24000, requested: 20000 }));

        let stored = fx.reservations.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn test_receipt_for_another_order() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A]).await;
        fx.verifier.register_completed("r-other", "rsv_somebodyelse", 12000).await;

        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-other", 12000, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PaymentIDReceiptIDNotMatching");
    }

    #[tokio::test]
    async fn test_unverified_receipt() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A]).await;
        fx.verifier
            .register(VerifiedReceipt {
                receipt_id: "r-pending".to_string(),
                order_id: reservation.payment_id.clone(),
                price: 12000,
                status: ReceiptStatus::Pending,
                paid_at: None,
            })
            .await;

        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-pending", 12000, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UnverifiedReceipt");

        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-missing", 12000, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VerifyRequestFail");
    }

    #[tokio::test]
    async fn test_ownership_and_state() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A]).await;
        fx.verifier.register_completed("r-1", &reservation.payment_id, 12000).await;

        let err = fx
            .reconciler
            .confirm_payment(VIP_MEMBER, confirm(&reservation, "r-1", 12000, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ReservationOwnership");

        fx.reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", 12000, 0))
            .await
            .unwrap();
        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", 12000, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidReservationId");
    }

    #[tokio::test]
    async fn test_expired_hold_cancels_reservation() {
        let policy = ReservationPolicy {
            hold_ttl: chrono::Duration::zero(),
            ..ReservationPolicy::default()
        };
        let fx = Fixture::with_policy(policy).await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A]).await;
        fx.verifier.register_completed("r-1", &reservation.payment_id, 12000).await;

        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", 12000, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "HoldExpired");

        let stored = fx.reservations.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Canceled);
        assert!(fx.ledger.occupied(SCHEDULE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_or_negative_amounts() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A]).await;
        fx.verifier.register_completed("r-1", &reservation.payment_id, 13000).await;

        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", i64::MAX, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "IncorrectPrice");

        // Sums to the expected 12000 but the discount is negative
        let err = fx
            .reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", 13000, -1000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "IncorrectPrice");

        let stored = fx.reservations.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
        assert!(fx.verifier.canceled_receipts().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_refunds_and_frees_seats() {
        let fx = Fixture::new().await;
        let reservation = fx.hold(BASIC_MEMBER, vec![SEAT_A]).await;
        fx.verifier.register_completed("r-1", &reservation.payment_id, 12000).await;

        let reconciler = PaymentReconciler::new(
            Arc::new(ConfirmFails(fx.reservations.clone())),
            fx.ledger.clone(),
            fx.verifier.clone(),
            fx.catalog.clone(),
            ReservationPolicy::default(),
        );
        let err = reconciler
            .confirm_payment(BASIC_MEMBER, confirm(&reservation, "r-1", 12000, 0))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "InternalError");
        assert_eq!(fx.verifier.canceled_receipts().await, vec!["r-1".to_string()]);
        assert!(fx.ledger.occupied(SCHEDULE).await.unwrap().is_empty());
        let stored = fx.reservations.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Canceled);
    }
}
