use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Proof of a seat hold. Every ledger operation after `try_hold` is keyed by it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoldToken {
    pub id: Uuid,
    pub schedule_id: i64,
    /// Sorted, de-duplicated
    pub seat_ids: Vec<i64>,
    pub holder_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl HoldToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No seats selected")]
    EmptySelection,

    #[error("Seats already taken: {seat_ids:?}")]
    SeatTaken {
        seat_ids: Vec<i64>,
    },

    #[error("Hold {0} is no longer active")]
    HoldNotActive(Uuid),

    #[error("Ledger backend error: {0}")]
    Backend(String),
}

/// Authoritative record of which seats are held or confirmed per schedule.
///
/// Implementations must make `try_hold` atomic across all requested seats:
/// for overlapping seat sets on one schedule, at most one concurrent call wins.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// Hold every seat in `seat_ids` for `ttl`, or none of them
    async fn try_hold(
        &self,
        schedule_id: i64,
        seat_ids: &[i64],
        holder_id: i64,
        ttl: Duration,
    ) -> Result<HoldToken, LedgerError>;

    /// Turn an unexpired hold into a permanent allocation, all seats or none
    async fn confirm(&self, token: &HoldToken) -> Result<(), LedgerError>;

    /// Free every live seat still owned by the token. `false` when there was
    /// nothing to free (already released or expired).
    async fn release(&self, token: &HoldToken) -> Result<bool, LedgerError>;

    /// Seats currently held (unexpired) or confirmed on a schedule, sorted
    async fn occupied(&self, schedule_id: i64) -> Result<Vec<i64>, LedgerError>;

    /// Drop stale holds, returns how many seat claims were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError>;
}

/// Sort and de-duplicate a seat selection so locks are always taken in the same order
pub fn normalize_seats(seat_ids: &[i64]) -> Vec<i64> {
    let mut seats = seat_ids.to_vec();
    seats.sort_unstable();
    seats.dedup();
    seats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimState {
    Held { expires_at: DateTime<Utc> },
    Confirmed,
}

#[derive(Debug, Clone)]
struct Claim {
    token: Uuid,
    state: ClaimState,
}

impl Claim {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            ClaimState::Held { expires_at } => expires_at > now,
            ClaimState::Confirmed => true,
        }
    }
}

/// Single-process ledger. One mutex guards every schedule, so a multi-seat
/// check-and-set is a single critical section.
#[derive(Default)]
pub struct InMemorySeatLedger {
    schedules: Mutex<HashMap<i64, HashMap<i64, Claim>>>,
}

impl InMemorySeatLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeatLedger for InMemorySeatLedger {
    async fn try_hold(
        &self,
        schedule_id: i64,
        seat_ids: &[i64],
        holder_id: i64,
        ttl: Duration,
    ) -> Result<HoldToken, LedgerError> {
        let seats = normalize_seats(seat_ids);
        if seats.is_empty() {
            return Err(LedgerError::EmptySelection);
        }

        let now = Utc::now();
        let mut schedules = self.schedules.lock().await;
        let claims = schedules.entry(schedule_id).or_default();

        let taken: Vec<i64> = seats
            .iter()
            .copied()
            .filter(|seat| claims.get(seat).is_some_and(|c| c.is_live(now)))
            .collect();
        if !taken.is_empty() {
            return Err(LedgerError::SeatTaken { seat_ids: taken });
        }

        let token = HoldToken {
            id: Uuid::new_v4(),
            schedule_id,
            seat_ids: seats,
            holder_id,
            expires_at: now + ttl,
        };
        for seat in &token.seat_ids {
            claims.insert(
                *seat,
                Claim {
                    token: token.id,
                    state: ClaimState::Held { expires_at: token.expires_at },
                },
            );
        }

        tracing::debug!("Held seats {:?} on schedule {} (hold {})", token.seat_ids, schedule_id, token.id);
        Ok(token)
    }

    async fn confirm(&self, token: &HoldToken) -> Result<(), LedgerError> {
        let now = Utc::now();
        let mut schedules = self.schedules.lock().await;
        let claims = schedules
            .get_mut(&token.schedule_id)
            .ok_or(LedgerError::HoldNotActive(token.id))?;

        let all_held = token.seat_ids.iter().all(|seat| {
            claims.get(seat).is_some_and(|c| {
                c.token == token.id && matches!(c.state, ClaimState::Held { expires_at } if expires_at > now)
            })
        });
        if !all_held {
            return Err(LedgerError::HoldNotActive(token.id));
        }

        for seat in &token.seat_ids {
            if let Some(claim) = claims.get_mut(seat) {
                claim.state = ClaimState::Confirmed;
            }
        }
        Ok(())
    }

    async fn release(&self, token: &HoldToken) -> Result<bool, LedgerError> {
        let now = Utc::now();
        let mut schedules = self.schedules.lock().await;
        let claims = match schedules.get_mut(&token.schedule_id) {
            Some(claims) => claims,
            None => return Ok(false),
        };

        let mut freed = 0;
        for seat in &token.seat_ids {
            if claims.get(seat).is_some_and(|c| c.token == token.id) {
                if let Some(claim) = claims.remove(seat) {
                    if claim.is_live(now) {
                        freed += 1;
                    }
                }
            }
        }

        if claims.is_empty() {
            schedules.remove(&token.schedule_id);
        }
        Ok(freed > 0)
    }

    async fn occupied(&self, schedule_id: i64) -> Result<Vec<i64>, LedgerError> {
        let now = Utc::now();
        let schedules = self.schedules.lock().await;
        let mut seats: Vec<i64> = schedules
            .get(&schedule_id)
            .map(|claims| {
                claims
                    .iter()
                    .filter(|(_, c)| c.is_live(now))
                    .map(|(seat, _)| *seat)
                    .collect()
            })
            .unwrap_or_default();
        seats.sort_unstable();
        Ok(seats)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let mut schedules = self.schedules.lock().await;
        let mut removed = 0;

        schedules.retain(|_, claims| {
            let before = claims.len();
            claims.retain(|_, c| c.is_live(now));
            removed += before - claims.len();
            !claims.is_empty()
        });

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ttl() -> Duration {
        Duration::minutes(10)
    }

    #[tokio::test]
    async fn test_hold_conflict_and_release() {
        let ledger = InMemorySeatLedger::new();

        let token = ledger.try_hold(1, &[2, 1], 100, ttl()).await.unwrap();
        assert_eq!(token.seat_ids, vec![1, 2]);

        let err = ledger.try_hold(1, &[2, 3], 200, ttl()).await.unwrap_err();
        assert_eq!(err, LedgerError::SeatTaken { seat_ids: vec![2] });
        // The failed hold left nothing behind
        assert_eq!(ledger.occupied(1).await.unwrap(), vec![1, 2]);

        assert!(ledger.release(&token).await.unwrap());
        assert!(!ledger.release(&token).await.unwrap());

        let other = ledger.try_hold(1, &[2, 3], 200, ttl()).await.unwrap();
        assert_eq!(other.holder_id, 200);
    }

    #[tokio::test]
    async fn test_same_seat_different_schedule() {
        let ledger = InMemorySeatLedger::new();
        ledger.try_hold(1, &[5], 100, ttl()).await.unwrap();
        ledger.try_hold(2, &[5], 200, ttl()).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let ledger = InMemorySeatLedger::new();
        assert_eq!(ledger.try_hold(1, &[], 100, ttl()).await.unwrap_err(), LedgerError::EmptySelection);
    }

    #[tokio::test]
    async fn test_confirm_requires_live_hold() {
        let ledger = InMemorySeatLedger::new();
        let token = ledger.try_hold(1, &[1, 2], 100, ttl()).await.unwrap();
        ledger.confirm(&token).await.unwrap();

        // Confirmed seats stay taken and cannot be confirmed twice
        assert!(ledger.try_hold(1, &[1], 200, ttl()).await.is_err());
        assert_eq!(ledger.confirm(&token).await.unwrap_err(), LedgerError::HoldNotActive(token.id));

        let expired = ledger.try_hold(1, &[3], 100, Duration::zero()).await.unwrap();
        assert_eq!(ledger.confirm(&expired).await.unwrap_err(), LedgerError::HoldNotActive(expired.id));
    }

    #[tokio::test]
    async fn test_expired_hold_is_free() {
        let ledger = InMemorySeatLedger::new();
        let stale = ledger.try_hold(1, &[1, 2], 100, Duration::zero()).await.unwrap();
        assert!(ledger.occupied(1).await.unwrap().is_empty());

        let fresh = ledger.try_hold(1, &[2], 200, ttl()).await.unwrap();

        // Releasing the stale token must not touch the seat now owned by the fresh hold
        assert!(!ledger.release(&stale).await.unwrap());
        assert_eq!(ledger.occupied(1).await.unwrap(), vec![2]);

        assert_eq!(ledger.purge_expired(Utc::now()).await.unwrap(), 0);
        ledger.release(&fresh).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let ledger = InMemorySeatLedger::new();
        ledger.try_hold(1, &[1, 2], 100, Duration::zero()).await.unwrap();
        ledger.try_hold(1, &[3], 100, ttl()).await.unwrap();

        assert_eq!(ledger.purge_expired(Utc::now()).await.unwrap(), 2);
        assert_eq!(ledger.occupied(1).await.unwrap(), vec![3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_holds() {
        let ledger = Arc::new(InMemorySeatLedger::new());

        let mut handles = Vec::new();
        for holder in 0..32i64 {
            let ledger = ledger.clone();
            // Every selection contains seat 10
            let seats = vec![10, 11 + holder % 4];
            handles.push(tokio::spawn(async move { ledger.try_hold(7, &seats, holder, ttl()).await }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(LedgerError::SeatTaken { seat_ids }) => assert!(seat_ids.contains(&10)),
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(ledger.occupied(7).await.unwrap().len(), 2);
    }
}
