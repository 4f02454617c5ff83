use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinebox_core::{
    Member, MemberRepository, Movie, Schedule, ScheduleDetail, ScheduleRepository, Screen, Seat,
    Theater,
};
use sqlx::PgPool;

/// Catalog and member lookups over Postgres
pub struct StoreCatalogRepository {
    pool: PgPool,
}

impl StoreCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SCHEDULE_DETAIL_SELECT: &str = r#"
    SELECT s.id, s.movie_id, s.screen_id, s.start_time,
           m.name_kor, m.name_eng, m.age_grade, m.running_time_minutes, m.poster,
           sc.theater_id, sc.name AS screen_name, sc.screen_type, sc.seats_type,
           t.name AS theater_name, t.region_id, r.name AS region_name
    FROM schedules s
    JOIN movies m ON m.id = s.movie_id
    JOIN screens sc ON sc.id = s.screen_id
    JOIN theaters t ON t.id = sc.theater_id
    JOIN regions r ON r.id = t.region_id
"#;

#[derive(sqlx::FromRow)]
struct ScheduleDetailRow {
    id: i64,
    movie_id: i64,
    screen_id: i64,
    start_time: DateTime<Utc>,
    name_kor: String,
    name_eng: String,
    age_grade: String,
    running_time_minutes: i64,
    poster: Option<String>,
    theater_id: i64,
    screen_name: String,
    screen_type: String,
    seats_type: String,
    theater_name: String,
    region_id: i64,
    region_name: String,
}

impl From<ScheduleDetailRow> for ScheduleDetail {
    fn from(row: ScheduleDetailRow) -> Self {
        ScheduleDetail {
            schedule: Schedule {
                id: row.id,
                movie_id: row.movie_id,
                screen_id: row.screen_id,
                start_time: row.start_time,
            },
            movie: Movie {
                id: row.movie_id,
                name_kor: row.name_kor,
                name_eng: row.name_eng,
                age_grade: row.age_grade,
                running_time_minutes: row.running_time_minutes,
                poster: row.poster,
            },
            screen: Screen {
                id: row.screen_id,
                theater_id: row.theater_id,
                name: row.screen_name,
                screen_type: row.screen_type,
                seats_type: row.seats_type,
            },
            theater: Theater {
                id: row.theater_id,
                name: row.theater_name,
                region_id: row.region_id,
                region_name: row.region_name,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    screen_id: i64,
    name: String,
    grade: String,
    seat_type: String,
}

impl TryFrom<SeatRow> for Seat {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            id: row.id,
            screen_id: row.screen_id,
            name: row.name,
            grade: row.grade.parse()?,
            seat_type: row.seat_type.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: i64,
    name: String,
    tier: String,
    point: i64,
}

#[async_trait]
impl ScheduleRepository for StoreCatalogRepository {
    async fn get_schedule(
        &self,
        id: i64,
    ) -> Result<Option<ScheduleDetail>, Box<dyn std::error::Error + Send + Sync>> {
        let sql = format!("{} WHERE s.id = $1", SCHEDULE_DETAIL_SELECT);
        let row: Option<ScheduleDetailRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ScheduleDetail::from))
    }

    async fn list_schedules(
        &self,
        theater_id: Option<i64>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduleDetail>, Box<dyn std::error::Error + Send + Sync>> {
        let sql = format!(
            "{} WHERE s.start_time >= $1 AND s.start_time < $2 AND ($3::BIGINT IS NULL OR sc.theater_id = $3) ORDER BY s.start_time, s.id",
            SCHEDULE_DETAIL_SELECT
        );
        let rows: Vec<ScheduleDetailRow> = sqlx::query_as(&sql)
            .bind(from)
            .bind(to)
            .bind(theater_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ScheduleDetail::from).collect())
    }

    async fn list_seats(
        &self,
        screen_id: i64,
    ) -> Result<Vec<Seat>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, screen_id, name, grade, seat_type FROM seats WHERE screen_id = $1 ORDER BY name",
        )
        .bind(screen_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Seat::try_from).collect()
    }
}

#[async_trait]
impl MemberRepository for StoreCatalogRepository {
    async fn get_member(
        &self,
        id: i64,
    ) -> Result<Option<Member>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<MemberRow> = sqlx::query_as("SELECT id, name, tier, point FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Member {
                id: row.id,
                name: row.name,
                tier: row.tier.parse()?,
                point: row.point,
            })),
            None => Ok(None),
        }
    }
}
