use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::FixedOffset;
use cinebox_catalog::schedule::{
    local_day_window, offset_from_minutes, parse_date_segment, region_counts, theaters_showing,
};
use cinebox_catalog::{GradeCounts, MovieFilter, RegionCount, ScheduleListing, SeatMap, TheaterListing};
use cinebox_core::ScheduleDetail;
use cinebox_order::ReservationError;
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::AppError;
use crate::state::AppState;

// Date and schedule-id routes share one segment name so the router accepts both shapes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/theaters/{theater_id}/schedules/{date}", get(list_theater_schedules))
        .route("/v1/schedules/{key}/theaters", get(list_theaters))
        .route("/v1/schedules/{key}/regions", get(list_regions))
        .route("/v1/schedules/{key}/seats", get(seat_map))
        .route("/v1/schedules/{key}/price", get(price_quote))
        .route("/v1/schedules/{key}/stream", get(seat_stream))
}

#[derive(Debug, Deserialize)]
pub struct MovieQuery {
    /// Up to three movie ids separated by spaces
    pub movie: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PriceQuote {
    pub schedule_id: i64,
    pub grades: GradeCounts,
    pub total_price: i64,
}

impl AppState {
    fn utc_offset(&self) -> Result<FixedOffset, AppError> {
        Ok(offset_from_minutes(self.business_rules.utc_offset_minutes)?)
    }

    /// Schedules of one local day, movie filter applied
    async fn schedules_on(
        &self,
        theater_id: Option<i64>,
        date: &str,
        movies: &MovieQuery,
    ) -> Result<Vec<ScheduleDetail>, AppError> {
        let day = parse_date_segment(date)?;
        let filter = MovieFilter::parse(movies.movie.as_deref())?;
        let (from, to) = local_day_window(day, self.utc_offset()?)?;

        let details = self.schedules.list_schedules(theater_id, from, to).await?;
        Ok(filter.apply(details))
    }

    async fn schedule(&self, schedule_id: i64) -> Result<ScheduleDetail, AppError> {
        self.schedules
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| ReservationError::InvalidScheduleId(schedule_id).into())
    }
}

fn parse_schedule_id(key: &str) -> Result<i64, AppError> {
    key.parse()
        .map_err(|_| AppError::BadRequest(format!("'{}' is not a schedule id", key)))
}

async fn list_theater_schedules(
    State(state): State<AppState>,
    WithRejection(Path((theater_id, date)), _): WithRejection<Path<(i64, String)>, AppError>,
    WithRejection(Query(movies), _): WithRejection<Query<MovieQuery>, AppError>,
) -> Result<Json<Vec<ScheduleListing>>, AppError> {
    let offset = state.utc_offset()?;
    let details = state.schedules_on(Some(theater_id), &date, &movies).await?;

    let mut listings = Vec::with_capacity(details.len());
    for detail in &details {
        let seats = state.schedules.list_seats(detail.screen.id).await?;
        let occupied = state.ledger.occupied(detail.id()).await?;
        let map = SeatMap::build(&seats, &occupied);
        listings.push(ScheduleListing::new(detail, offset, map.total_seats, map.reserved_seats));
    }

    Ok(Json(listings))
}

async fn list_theaters(
    State(state): State<AppState>,
    WithRejection(Path(date), _): WithRejection<Path<String>, AppError>,
    WithRejection(Query(movies), _): WithRejection<Query<MovieQuery>, AppError>,
) -> Result<Json<Vec<TheaterListing>>, AppError> {
    let details = state.schedules_on(None, &date, &movies).await?;
    Ok(Json(theaters_showing(&details)))
}

async fn list_regions(
    State(state): State<AppState>,
    WithRejection(Path(date), _): WithRejection<Path<String>, AppError>,
    WithRejection(Query(movies), _): WithRejection<Query<MovieQuery>, AppError>,
) -> Result<Json<Vec<RegionCount>>, AppError> {
    let details = state.schedules_on(None, &date, &movies).await?;
    Ok(Json(region_counts(&details)))
}

async fn seat_map(
    State(state): State<AppState>,
    WithRejection(Path(key), _): WithRejection<Path<String>, AppError>,
) -> Result<Json<SeatMap>, AppError> {
    let detail = state.schedule(parse_schedule_id(&key)?).await?;
    let seats = state.schedules.list_seats(detail.screen.id).await?;
    let occupied = state.ledger.occupied(detail.id()).await?;

    Ok(Json(SeatMap::build(&seats, &occupied)))
}

async fn price_quote(
    State(state): State<AppState>,
    WithRejection(Path(key), _): WithRejection<Path<String>, AppError>,
    WithRejection(Query(choices), _): WithRejection<Query<HashMap<String, u32>>, AppError>,
) -> Result<Json<PriceQuote>, AppError> {
    let detail = state.schedule(parse_schedule_id(&key)?).await?;
    let grades = GradeCounts::from_choices(&choices).map_err(ReservationError::from)?;

    Ok(Json(PriceQuote {
        schedule_id: detail.id(),
        grades,
        total_price: state.business_rules.prices.total(&grades),
    }))
}

/// Live seat occupancy changes for one schedule
async fn seat_stream(
    State(state): State<AppState>,
    WithRejection(Path(key), _): WithRejection<Path<String>, AppError>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let schedule_id = state.schedule(parse_schedule_id(&key)?).await?.id();
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.schedule_id == schedule_id => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok::<_, Infallible>(Event::default().event(event.event_name()).data(data)))
            }
            // Other schedules, or the subscriber lagged behind
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
