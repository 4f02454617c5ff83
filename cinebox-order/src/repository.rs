use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Payment, Reservation, ReservationStatus};

/// Persistence for reservations. State changes are compare-and-set so that
/// concurrent confirm/cancel/expiry on one reservation have exactly one winner.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn insert(
        &self,
        reservation: &Reservation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get(
        &self,
        id: Uuid,
    ) -> Result<Option<Reservation>, Box<dyn std::error::Error + Send + Sync>>;

    /// Pending → Confirmed, storing the payment. `false` if no longer pending.
    async fn confirm(
        &self,
        id: Uuid,
        payment: &Payment,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// `from` → Canceled, marking any payment canceled at `at`.
    /// `false` if the reservation is not in `from` anymore.
    async fn cancel(
        &self,
        id: Uuid,
        from: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Newest first
    async fn list_by_member(
        &self,
        member_id: i64,
    ) -> Result<Vec<Reservation>, Box<dyn std::error::Error + Send + Sync>>;

    /// Pending reservations whose hold expired at or before `now`
    async fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, Box<dyn std::error::Error + Send + Sync>>;
}

/// In-memory reservation store
#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: RwLock<HashMap<Uuid, Reservation>>,
}

impl InMemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn insert(
        &self,
        reservation: &Reservation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut reservations = self.reservations.write().await;
        if reservations.contains_key(&reservation.id) {
            return Err(format!("Reservation {} already exists", reservation.id).into());
        }
        reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get(
        &self,
        id: Uuid,
    ) -> Result<Option<Reservation>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.reservations.read().await.get(&id).cloned())
    }

    async fn confirm(
        &self,
        id: Uuid,
        payment: &Payment,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut reservations = self.reservations.write().await;
        Ok(reservations
            .get_mut(&id)
            .is_some_and(|r| r.apply_confirm(payment.clone())))
    }

    async fn cancel(
        &self,
        id: Uuid,
        from: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut reservations = self.reservations.write().await;
        Ok(reservations
            .get_mut(&id)
            .is_some_and(|r| r.apply_cancel(from, at)))
    }

    async fn list_by_member(
        &self,
        member_id: i64,
    ) -> Result<Vec<Reservation>, Box<dyn std::error::Error + Send + Sync>> {
        let mut list: Vec<Reservation> = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.member_id == member_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at));
        Ok(list)
    }

    async fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.hold_expired(now))
            .cloned()
            .collect())
    }
}
