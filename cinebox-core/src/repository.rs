use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Member, ScheduleDetail, Seat};

/// Read access to theaters, screens, schedules and seats
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn get_schedule(
        &self,
        id: i64,
    ) -> Result<Option<ScheduleDetail>, Box<dyn std::error::Error + Send + Sync>>;

    /// Schedules starting in `[from, to)`, optionally limited to one theater,
    /// ordered by start time.
    async fn list_schedules(
        &self,
        theater_id: Option<i64>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduleDetail>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_seats(
        &self,
        screen_id: i64,
    ) -> Result<Vec<Seat>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Read access to member profiles
#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn get_member(
        &self,
        id: i64,
    ) -> Result<Option<Member>, Box<dyn std::error::Error + Send + Sync>>;
}
