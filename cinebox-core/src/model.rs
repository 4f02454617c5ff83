use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Pricing category of a seat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SeatGrade {
    Adult,
    Teen,
    Preferential,
}

impl SeatGrade {
    pub const ALL: [SeatGrade; 3] = [SeatGrade::Adult, SeatGrade::Teen, SeatGrade::Preferential];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatGrade::Adult => "adult",
            SeatGrade::Teen => "teen",
            SeatGrade::Preferential => "preferential",
        }
    }
}

impl fmt::Display for SeatGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatGrade {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adult" => Ok(SeatGrade::Adult),
            "teen" => Ok(SeatGrade::Teen),
            "preferential" => Ok(SeatGrade::Preferential),
            other => Err(CoreError::ValidationError(format!(
                "unknown seat grade '{}', expected one of adult, teen, preferential",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatType {
    General,
    /// Blocked for distancing, never reservable
    SitApart,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::General => "general",
            SeatType::SitApart => "sit_apart",
        }
    }
}

impl FromStr for SeatType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(SeatType::General),
            "sit_apart" => Ok(SeatType::SitApart),
            other => Err(CoreError::ValidationError(format!("unknown seat type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberTier {
    Basic,
    Vip,
}

impl FromStr for MemberTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BASIC" => Ok(MemberTier::Basic),
            "VIP" => Ok(MemberTier::Vip),
            other => Err(CoreError::ValidationError(format!("unknown member tier '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Theater {
    pub id: i64,
    pub name: String,
    pub region_id: i64,
    pub region_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Screen {
    pub id: i64,
    pub theater_id: i64,
    pub name: String,
    pub screen_type: String,
    pub seats_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: i64,
    pub name_kor: String,
    pub name_eng: String,
    /// Age rating: all, 12+, 15+, 18+
    pub age_grade: String,
    pub running_time_minutes: i64,
    pub poster: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub id: i64,
    pub movie_id: i64,
    pub screen_id: i64,
    pub start_time: DateTime<Utc>,
}

/// A schedule joined with everything needed to display or reserve it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleDetail {
    pub schedule: Schedule,
    pub movie: Movie,
    pub screen: Screen,
    pub theater: Theater,
}

impl ScheduleDetail {
    pub fn id(&self) -> i64 {
        self.schedule.id
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.schedule.start_time <= now
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.schedule.start_time + Duration::minutes(self.movie.running_time_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: i64,
    pub screen_id: i64,
    pub name: String,
    pub grade: SeatGrade,
    pub seat_type: SeatType,
}

impl Seat {
    pub fn is_reservable(&self) -> bool {
        self.seat_type == SeatType::General
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub tier: MemberTier,
    pub point: i64,
}
