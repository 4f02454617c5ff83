use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::model::{Member, Movie, Schedule, ScheduleDetail, Screen, Seat, Theater};
use crate::repository::{MemberRepository, ScheduleRepository};

#[derive(Default)]
struct CatalogData {
    theaters: HashMap<i64, Theater>,
    screens: HashMap<i64, Screen>,
    movies: HashMap<i64, Movie>,
    schedules: HashMap<i64, Schedule>,
    seats: HashMap<i64, Vec<Seat>>,
    members: HashMap<i64, Member>,
}

impl CatalogData {
    fn detail(&self, schedule: &Schedule) -> Option<ScheduleDetail> {
        let screen = self.screens.get(&schedule.screen_id)?;
        Some(ScheduleDetail {
            schedule: schedule.clone(),
            movie: self.movies.get(&schedule.movie_id)?.clone(),
            theater: self.theaters.get(&screen.theater_id)?.clone(),
            screen: screen.clone(),
        })
    }
}

/// In-memory catalog and member directory (tests and local runs)
#[derive(Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_theater(&self, theater: Theater) {
        self.data.write().await.theaters.insert(theater.id, theater);
    }

    pub async fn add_screen(&self, screen: Screen, seats: Vec<Seat>) {
        let mut data = self.data.write().await;
        data.seats.insert(screen.id, seats);
        data.screens.insert(screen.id, screen);
    }

    pub async fn add_movie(&self, movie: Movie) {
        self.data.write().await.movies.insert(movie.id, movie);
    }

    pub async fn add_schedule(&self, schedule: Schedule) {
        self.data.write().await.schedules.insert(schedule.id, schedule);
    }

    pub async fn add_member(&self, member: Member) {
        self.data.write().await.members.insert(member.id, member);
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryCatalog {
    async fn get_schedule(
        &self,
        id: i64,
    ) -> Result<Option<ScheduleDetail>, Box<dyn std::error::Error + Send + Sync>> {
        let data = self.data.read().await;
        Ok(data.schedules.get(&id).and_then(|s| data.detail(s)))
    }

    async fn list_schedules(
        &self,
        theater_id: Option<i64>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduleDetail>, Box<dyn std::error::Error + Send + Sync>> {
        let data = self.data.read().await;
        let mut details: Vec<ScheduleDetail> = data
            .schedules
            .values()
            .filter(|s| s.start_time >= from && s.start_time < to)
            .filter_map(|s| data.detail(s))
            .filter(|d| theater_id.map_or(true, |id| d.theater.id == id))
            .collect();

        details.sort_by_key(|d| (d.schedule.start_time, d.schedule.id));
        Ok(details)
    }

    async fn list_seats(
        &self,
        screen_id: i64,
    ) -> Result<Vec<Seat>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.data.read().await.seats.get(&screen_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MemberRepository for InMemoryCatalog {
    async fn get_member(
        &self,
        id: i64,
    ) -> Result<Option<Member>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.data.read().await.members.get(&id).cloned())
    }
}
