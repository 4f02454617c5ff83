use chrono::{DateTime, Utc};
use cinebox_catalog::{GradeCounts, SavingRates};
use cinebox_core::{MemberRepository, MemberTier, ScheduleDetail, ScheduleRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ReservationError;
use crate::models::{Reservation, ReservationStatus};
use crate::repository::ReservationRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    /// Confirmed reservations whose screening is still ahead
    #[default]
    Reserved,
    /// Confirmed reservations whose screening has started
    Watched,
    Canceled,
}

impl HistoryFilter {
    fn matches(&self, reservation: &Reservation, detail: &ScheduleDetail, now: DateTime<Utc>) -> bool {
        match self {
            HistoryFilter::Reserved => {
                reservation.status == ReservationStatus::Confirmed && !detail.has_started(now)
            }
            HistoryFilter::Watched => {
                reservation.status == ReservationStatus::Confirmed && detail.has_started(now)
            }
            HistoryFilter::Canceled => reservation.status == ReservationStatus::Canceled,
        }
    }
}

impl FromStr for HistoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(HistoryFilter::Reserved),
            "watched" => Ok(HistoryFilter::Watched),
            "canceled" => Ok(HistoryFilter::Canceled),
            other => Err(format!("unknown history filter '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub reservation_id: Uuid,
    pub movie: String,
    pub theater: String,
    pub screen: String,
    pub start_time: DateTime<Utc>,
    pub price: i64,
    pub discount_price: i64,
    pub seat_grade: GradeCounts,
    pub seat_name: Vec<String>,
    pub saving_point: i64,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct HistorySummary {
    pub reserved_count: usize,
    pub watched_count: usize,
    pub canceled_count: usize,
}

/// Member-facing view over past and upcoming reservations
pub struct ReservationHistory {
    schedules: Arc<dyn ScheduleRepository>,
    members: Arc<dyn MemberRepository>,
    reservations: Arc<dyn ReservationRepository>,
    saving_rates: SavingRates,
}

impl ReservationHistory {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        members: Arc<dyn MemberRepository>,
        reservations: Arc<dyn ReservationRepository>,
        saving_rates: SavingRates,
    ) -> Self {
        Self {
            schedules,
            members,
            reservations,
            saving_rates,
        }
    }

    /// Newest first
    pub async fn history(
        &self,
        member_id: i64,
        filter: HistoryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, ReservationError> {
        let tier = match self.members.get_member(member_id).await? {
            Some(member) => member.tier,
            None => {
                tracing::warn!("Member {} not found, using BASIC saving rate", member_id);
                MemberTier::Basic
            }
        };

        let mut entries = Vec::new();
        for (reservation, detail) in self.load(member_id).await? {
            if !filter.matches(&reservation, &detail, now) {
                continue;
            }

            let seats = self.schedules.list_seats(detail.screen.id).await?;
            let names: HashMap<i64, &str> = seats.iter().map(|s| (s.id, s.name.as_str())).collect();
            let seat_name = reservation
                .seat_ids
                .iter()
                .filter_map(|id| names.get(id).map(|n| n.to_string()))
                .collect();

            let (price, discount_price, saving_point) = match &reservation.payment {
                Some(p) if !p.is_canceled => (
                    p.price,
                    p.discount_price,
                    self.saving_rates.saving_point(tier, p.price, p.discount_price),
                ),
                Some(p) => (p.price, p.discount_price, 0),
                None => (reservation.expected_total, 0, 0),
            };

            entries.push(HistoryEntry {
                reservation_id: reservation.id,
                movie: detail.movie.name_kor.clone(),
                theater: detail.theater.name.clone(),
                screen: detail.screen.name.clone(),
                start_time: detail.schedule.start_time,
                price,
                discount_price,
                seat_grade: reservation.grades,
                seat_name,
                saving_point,
                canceled_at: reservation.canceled_at,
            });
        }
        Ok(entries)
    }

    pub async fn summary(&self, member_id: i64, now: DateTime<Utc>) -> Result<HistorySummary, ReservationError> {
        let mut summary = HistorySummary::default();
        for (reservation, detail) in self.load(member_id).await? {
            if HistoryFilter::Reserved.matches(&reservation, &detail, now) {
                summary.reserved_count += 1;
            }
            if HistoryFilter::Watched.matches(&reservation, &detail, now) {
                summary.watched_count += 1;
            }
            if HistoryFilter::Canceled.matches(&reservation, &detail, now) {
                summary.canceled_count += 1;
            }
        }
        Ok(summary)
    }

    /// The member's reservations joined with their schedules
    async fn load(&self, member_id: i64) -> Result<Vec<(Reservation, ScheduleDetail)>, ReservationError> {
        let reservations = self.reservations.list_by_member(member_id).await?;
        let mut details: HashMap<i64, ScheduleDetail> = HashMap::new();
        let mut joined = Vec::with_capacity(reservations.len());

        for reservation in reservations {
            let detail = match details.get(&reservation.schedule_id) {
                Some(detail) => detail.clone(),
                None => match self.schedules.get_schedule(reservation.schedule_id).await? {
                    Some(detail) => {
                        details.insert(detail.id(), detail.clone());
                        detail
                    }
                    None => {
                        tracing::warn!(
                            "Reservation {} references missing schedule {}",
                            reservation.id,
                            reservation.schedule_id
                        );
                        continue;
                    }
                },
            };
            joined.push((reservation, detail));
        }
        Ok(joined)
    }
}
