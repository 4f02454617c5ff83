//! Shared test wiring: one theater, one screen with five seats, a future and a
//! past schedule, a BASIC and a VIP member.

use chrono::{Duration, Utc};
use cinebox_catalog::GradeCounts;
use cinebox_core::{
    InMemoryCatalog, Member, MemberTier, MockReceiptVerifier, Movie, Schedule, Screen, Seat,
    SeatGrade, SeatType, Theater,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::cancellation::CancellationHandler;
use crate::expiry::ExpirySweeper;
use crate::history::ReservationHistory;
use crate::ledger::{HoldToken, InMemorySeatLedger};
use crate::manager::{CreateReservation, ReservationManager};
use crate::models::{Payment, Reservation};
use crate::reconciler::{ConfirmPayment, PaymentReconciler};
use crate::repository::{InMemoryReservationRepository, ReservationRepository};
use crate::ReservationPolicy;

pub const SCREEN: i64 = 10;
pub const SCHEDULE: i64 = 100;
pub const PAST_SCHEDULE: i64 = 101;

pub const SEAT_A: i64 = 1001;
pub const SEAT_B: i64 = 1002;
pub const SEAT_C: i64 = 1003;
pub const SEAT_TEEN: i64 = 1004;
pub const SEAT_SIT_APART: i64 = 1005;

pub const BASIC_MEMBER: i64 = 1;
pub const VIP_MEMBER: i64 = 2;

fn seat(id: i64, name: &str, grade: SeatGrade, seat_type: SeatType) -> Seat {
    Seat {
        id,
        screen_id: SCREEN,
        name: name.to_string(),
        grade,
        seat_type,
    }
}

pub async fn seeded_catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog
        .add_theater(Theater {
            id: 1,
            name: "Gangnam".to_string(),
            region_id: 1,
            region_name: "Seoul".to_string(),
        })
        .await;
    catalog
        .add_screen(
            Screen {
                id: SCREEN,
                theater_id: 1,
                name: "1관".to_string(),
                screen_type: "2D".to_string(),
                seats_type: "standard".to_string(),
            },
            vec![
                seat(SEAT_A, "A1", SeatGrade::Adult, SeatType::General),
                seat(SEAT_B, "A2", SeatGrade::Adult, SeatType::General),
                seat(SEAT_C, "A3", SeatGrade::Adult, SeatType::General),
                seat(SEAT_TEEN, "B1", SeatGrade::Teen, SeatType::General),
                seat(SEAT_SIT_APART, "B2", SeatGrade::Adult, SeatType::SitApart),
            ],
        )
        .await;
    catalog
        .add_movie(Movie {
            id: 7,
            name_kor: "기생충".to_string(),
            name_eng: "Parasite".to_string(),
            age_grade: "15+".to_string(),
            running_time_minutes: 132,
            poster: None,
        })
        .await;
    catalog
        .add_schedule(Schedule {
            id: SCHEDULE,
            movie_id: 7,
            screen_id: SCREEN,
            start_time: Utc::now() + Duration::days(2),
        })
        .await;
    catalog
        .add_schedule(Schedule {
            id: PAST_SCHEDULE,
            movie_id: 7,
            screen_id: SCREEN,
            start_time: Utc::now() - Duration::hours(3),
        })
        .await;
    catalog
        .add_member(Member {
            id: BASIC_MEMBER,
            name: "Kim".to_string(),
            tier: MemberTier::Basic,
            point: 0,
        })
        .await;
    catalog
        .add_member(Member {
            id: VIP_MEMBER,
            name: "Lee".to_string(),
            tier: MemberTier::Vip,
            point: 0,
        })
        .await;
    catalog
}

pub struct Fixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub reservations: Arc<InMemoryReservationRepository>,
    pub ledger: Arc<InMemorySeatLedger>,
    pub verifier: Arc<MockReceiptVerifier>,
    pub manager: ReservationManager,
    pub reconciler: PaymentReconciler,
    pub cancellation: CancellationHandler,
    pub sweeper: ExpirySweeper,
    pub history: ReservationHistory,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_policy(ReservationPolicy::default()).await
    }

    pub async fn with_policy(policy: ReservationPolicy) -> Self {
        let catalog = Arc::new(seeded_catalog().await);
        let reservations = Arc::new(InMemoryReservationRepository::new());
        let ledger = Arc::new(InMemorySeatLedger::new());
        let verifier = Arc::new(MockReceiptVerifier::new());

        Self {
            manager: ReservationManager::new(catalog.clone(), reservations.clone(), ledger.clone(), policy.clone()),
            reconciler: PaymentReconciler::new(
                reservations.clone(),
                ledger.clone(),
                verifier.clone(),
                catalog.clone(),
                policy.clone(),
            ),
            cancellation: CancellationHandler::new(
                catalog.clone(),
                reservations.clone(),
                ledger.clone(),
                verifier.clone(),
                policy.clone(),
            ),
            sweeper: ExpirySweeper::new(reservations.clone(), ledger.clone()),
            history: ReservationHistory::new(catalog.clone(), catalog.clone(), reservations.clone(), policy.saving_rates),
            catalog,
            reservations,
            ledger,
            verifier,
        }
    }

    pub async fn hold(&self, member_id: i64, seat_ids: Vec<i64>) -> Reservation {
        self.manager
            .create_reservation(
                member_id,
                CreateReservation {
                    schedule_id: SCHEDULE,
                    seat_ids,
                    grades: None,
                },
            )
            .await
            .unwrap()
    }

    /// Register a matching completed receipt and confirm the reservation with it
    pub async fn pay(&self, reservation: &Reservation, discount_price: i64) -> Reservation {
        let price = reservation.expected_total - discount_price;
        let receipt_id = format!("receipt-{}", reservation.id.simple());
        self.verifier
            .register_completed(&receipt_id, &reservation.payment_id, price)
            .await;

        self.reconciler
            .confirm_payment(
                reservation.member_id,
                ConfirmPayment {
                    reservation_id: reservation.id,
                    receipt_id,
                    price,
                    discount_price,
                },
            )
            .await
            .unwrap()
            .reservation
    }

    /// Store a confirmed reservation for a schedule that already started
    pub async fn seed_watched(&self, member_id: i64, seat_ids: Vec<i64>, price: i64) -> Reservation {
        let hold = HoldToken {
            id: Uuid::new_v4(),
            schedule_id: PAST_SCHEDULE,
            seat_ids,
            holder_id: member_id,
            expires_at: Utc::now() - Duration::hours(4),
        };
        let grades = GradeCounts::new(hold.seat_ids.len() as u32, 0, 0);
        let mut reservation = Reservation::pending(member_id, grades, price, hold);
        reservation.apply_confirm(Payment::new(
            format!("receipt-{}", reservation.id.simple()),
            price,
            0,
            Utc::now() - Duration::hours(5),
        ));
        self.reservations.insert(&reservation).await.unwrap();
        reservation
    }
}
