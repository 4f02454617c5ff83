use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinebox_catalog::GradeCounts;
use cinebox_order::{HoldToken, Payment, Reservation, ReservationRepository, ReservationStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RESERVATION_SELECT: &str = r#"
    SELECT r.id, r.member_id, r.schedule_id, r.seat_ids,
           r.adult_count, r.teen_count, r.preferential_count,
           r.payment_id, r.hold_id, r.hold_expires_at, r.expected_total,
           r.status, r.reserved_at, r.canceled_at,
           p.receipt_id, p.price, p.discount_price, p.paid_at,
           p.is_canceled, p.canceled_at AS payment_canceled_at
    FROM reservations r
    LEFT JOIN payments p ON p.reservation_id = r.id
"#;

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    member_id: i64,
    schedule_id: i64,
    seat_ids: Vec<i64>,
    adult_count: i32,
    teen_count: i32,
    preferential_count: i32,
    payment_id: String,
    hold_id: Uuid,
    hold_expires_at: DateTime<Utc>,
    expected_total: i64,
    status: String,
    reserved_at: DateTime<Utc>,
    canceled_at: Option<DateTime<Utc>>,
    receipt_id: Option<String>,
    price: Option<i64>,
    discount_price: Option<i64>,
    paid_at: Option<DateTime<Utc>>,
    is_canceled: Option<bool>,
    payment_canceled_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status: ReservationStatus = row.status.parse()?;

        let payment = match (row.receipt_id, row.price, row.paid_at) {
            (Some(receipt_id), Some(price), Some(paid_at)) => Some(Payment {
                receipt_id,
                price,
                discount_price: row.discount_price.unwrap_or(0),
                paid_at,
                is_canceled: row.is_canceled.unwrap_or(false),
                canceled_at: row.payment_canceled_at,
            }),
            _ => None,
        };

        Ok(Reservation {
            id: row.id,
            member_id: row.member_id,
            schedule_id: row.schedule_id,
            seat_ids: row.seat_ids.clone(),
            grades: GradeCounts::new(
                u32::try_from(row.adult_count)?,
                u32::try_from(row.teen_count)?,
                u32::try_from(row.preferential_count)?,
            ),
            payment_id: row.payment_id,
            hold: HoldToken {
                id: row.hold_id,
                schedule_id: row.schedule_id,
                seat_ids: row.seat_ids,
                holder_id: row.member_id,
                expires_at: row.hold_expires_at,
            },
            expected_total: row.expected_total,
            status,
            payment,
            reserved_at: row.reserved_at,
            canceled_at: row.canceled_at,
        })
    }
}

fn to_reservations(
    rows: Vec<ReservationRow>,
) -> Result<Vec<Reservation>, Box<dyn std::error::Error + Send + Sync>> {
    rows.into_iter().map(Reservation::try_from).collect()
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn insert(
        &self,
        reservation: &Reservation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, member_id, schedule_id, seat_ids, adult_count, teen_count,
                preferential_count, payment_id, hold_id, hold_expires_at, expected_total, status, reserved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.member_id)
        .bind(reservation.schedule_id)
        .bind(&reservation.seat_ids)
        .bind(reservation.grades.adult as i32)
        .bind(reservation.grades.teen as i32)
        .bind(reservation.grades.preferential as i32)
        .bind(&reservation.payment_id)
        .bind(reservation.hold.id)
        .bind(reservation.hold.expires_at)
        .bind(reservation.expected_total)
        .bind(reservation.status.as_str())
        .bind(reservation.reserved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        id: Uuid,
    ) -> Result<Option<Reservation>, Box<dyn std::error::Error + Send + Sync>> {
        let sql = format!("{} WHERE r.id = $1", RESERVATION_SELECT);
        let row: Option<ReservationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Reservation::try_from).transpose()
    }

    async fn confirm(
        &self,
        id: Uuid,
        payment: &Payment,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE reservations SET status = 'confirmed' WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO payments (reservation_id, receipt_id, price, discount_price, paid_at, is_canceled)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            "#,
        )
        .bind(id)
        .bind(&payment.receipt_id)
        .bind(payment.price)
        .bind(payment.discount_price)
        .bind(payment.paid_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn cancel(
        &self,
        id: Uuid,
        from: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        if !from.can_transition_to(ReservationStatus::Canceled) {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE reservations SET status = 'canceled', canceled_at = $3 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE payments SET is_canceled = TRUE, canceled_at = $2 WHERE reservation_id = $1")
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_member(
        &self,
        member_id: i64,
    ) -> Result<Vec<Reservation>, Box<dyn std::error::Error + Send + Sync>> {
        let sql = format!("{} WHERE r.member_id = $1 ORDER BY r.reserved_at DESC", RESERVATION_SELECT);
        let rows: Vec<ReservationRow> = sqlx::query_as(&sql)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await?;

        to_reservations(rows)
    }

    async fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, Box<dyn std::error::Error + Send + Sync>> {
        let sql = format!(
            "{} WHERE r.status = 'pending' AND r.hold_expires_at <= $1 ORDER BY r.hold_expires_at LIMIT 500",
            RESERVATION_SELECT
        );
        let rows: Vec<ReservationRow> = sqlx::query_as(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        to_reservations(rows)
    }
}
