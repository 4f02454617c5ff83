use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use cinebox_core::ScheduleDetail;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of movies a browse request may filter on
pub const MAX_MOVIE_FILTER: usize = 3;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Invalid date '{0}', expected YYMMDD")]
    InvalidDate(String),

    #[error("Invalid movie filter: {0}")]
    InvalidMovieFilter(String),

    #[error("Invalid UTC offset: {0} minutes")]
    InvalidOffset(i32),
}

/// Parse a `YYMMDD` path segment, e.g. `200705`
pub fn parse_date_segment(segment: &str) -> Result<NaiveDate, CatalogError> {
    NaiveDate::parse_from_str(segment, "%y%m%d").map_err(|_| CatalogError::InvalidDate(segment.to_string()))
}

pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, CatalogError> {
    FixedOffset::east_opt(minutes * 60).ok_or(CatalogError::InvalidOffset(minutes))
}

/// UTC bounds `[from, to)` of a calendar day in the theater's local time
pub fn local_day_window(
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), CatalogError> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CatalogError::InvalidDate(date.to_string()))?;
    let from = offset
        .from_local_datetime(&midnight)
        .single()
        .ok_or_else(|| CatalogError::InvalidDate(date.to_string()))?
        .with_timezone(&Utc);

    Ok((from, from + Duration::days(1)))
}

/// Movie ids from the `movie` query parameter (space separated, at most three).
/// An empty filter matches every movie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieFilter(Vec<i64>);

impl MovieFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self, CatalogError> {
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(Self::default()),
        };

        let ids = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>()
                    .map_err(|_| CatalogError::InvalidMovieFilter(format!("'{}' is not a movie id", part)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if ids.len() > MAX_MOVIE_FILTER {
            return Err(CatalogError::InvalidMovieFilter(format!(
                "at most {} movies can be selected",
                MAX_MOVIE_FILTER
            )));
        }

        Ok(Self(ids))
    }

    pub fn matches(&self, movie_id: i64) -> bool {
        self.0.is_empty() || self.0.contains(&movie_id)
    }

    pub fn apply(&self, details: Vec<ScheduleDetail>) -> Vec<ScheduleDetail> {
        details
            .into_iter()
            .filter(|d| self.matches(d.movie.id))
            .collect()
    }
}

/// `131` minutes → `"2:11"`
pub fn format_running_time(minutes: i64) -> String {
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// One row of a theater's timetable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleListing {
    pub schedule_id: i64,
    pub date: String,
    pub start_time: String,
    pub running_time: String,
    pub end_time: String,
    pub movie: String,
    pub grade: String,
    pub region: String,
    pub theater: String,
    pub screen: String,
    pub screen_type: String,
    pub seats_type: String,
    pub poster: Option<String>,
    pub total_seats: usize,
    pub reserved_seats: usize,
}

impl ScheduleListing {
    pub fn new(detail: &ScheduleDetail, offset: FixedOffset, total_seats: usize, reserved_seats: usize) -> Self {
        let start = detail.schedule.start_time.with_timezone(&offset);
        let end = detail.end_time().with_timezone(&offset);

        Self {
            schedule_id: detail.schedule.id,
            date: start.format("%Y-%m-%d").to_string(),
            start_time: start.format("%H:%M").to_string(),
            running_time: format_running_time(detail.movie.running_time_minutes),
            end_time: end.format("%H:%M").to_string(),
            movie: detail.movie.name_kor.clone(),
            grade: detail.movie.age_grade.clone(),
            region: detail.theater.region_name.clone(),
            theater: detail.theater.name.clone(),
            screen: detail.screen.name.clone(),
            screen_type: detail.screen.screen_type.clone(),
            seats_type: detail.screen.seats_type.clone(),
            poster: detail.movie.poster.clone(),
            total_seats,
            reserved_seats,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TheaterListing {
    pub region: String,
    pub theater_id: i64,
    pub name: String,
}

/// Distinct theaters that have at least one of the given schedules, by theater id
pub fn theaters_showing(details: &[ScheduleDetail]) -> Vec<TheaterListing> {
    let mut theaters = BTreeMap::new();
    for detail in details {
        theaters.entry(detail.theater.id).or_insert_with(|| TheaterListing {
            region: detail.theater.region_name.clone(),
            theater_id: detail.theater.id,
            name: detail.theater.name.clone(),
        });
    }
    theaters.into_values().collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionCount {
    pub region_id: i64,
    pub region_name: String,
    pub region_count: usize,
}

/// Number of distinct showing theaters per region, by region id
pub fn region_counts(details: &[ScheduleDetail]) -> Vec<RegionCount> {
    let mut regions: BTreeMap<i64, (String, BTreeSet<i64>)> = BTreeMap::new();
    for detail in details {
        let entry = regions
            .entry(detail.theater.region_id)
            .or_insert_with(|| (detail.theater.region_name.clone(), BTreeSet::new()));
        entry.1.insert(detail.theater.id);
    }

    regions
        .into_iter()
        .map(|(region_id, (region_name, theaters))| RegionCount {
            region_id,
            region_name,
            region_count: theaters.len(),
        })
        .collect()
}
