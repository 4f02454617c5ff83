use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use cinebox_order::{CancelReservation, CreateReservation, Reservation};
use cinebox_shared::SeatEventKind;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::MemberClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route("/v1/reservations/cancel", post(cancel_reservation))
        .route("/v1/reservations/{id}", get(get_reservation))
}

#[derive(Debug, Serialize)]
pub struct ReservationCreated {
    pub reservation_id: Uuid,
    pub payment_id: String,
    pub expected_total: i64,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReservationCanceled {
    pub reservation_id: Uuid,
    pub status: &'static str,
}

/// POST /v1/reservations
async fn create_reservation(
    State(state): State<AppState>,
    claims: MemberClaims,
    WithRejection(Json(req), _): WithRejection<Json<CreateReservation>, AppError>,
) -> Result<Json<ReservationCreated>, AppError> {
    let member_id = claims.member_id()?;
    let reservation = state.manager.create_reservation(member_id, req).await?;

    state.events.seats_changed(
        reservation.schedule_id,
        &reservation.seat_ids,
        reservation.id,
        SeatEventKind::Held,
    );

    Ok(Json(ReservationCreated {
        reservation_id: reservation.id,
        payment_id: reservation.payment_id,
        expected_total: reservation.expected_total,
        hold_expires_at: reservation.hold.expires_at,
    }))
}

/// GET /v1/reservations/{id}
async fn get_reservation(
    State(state): State<AppState>,
    claims: MemberClaims,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.manager.get_reservation(&claims.requester()?, id).await?;
    Ok(Json(reservation))
}

/// POST /v1/reservations/cancel
async fn cancel_reservation(
    State(state): State<AppState>,
    claims: MemberClaims,
    WithRejection(Json(req), _): WithRejection<Json<CancelReservation>, AppError>,
) -> Result<Json<ReservationCanceled>, AppError> {
    let reservation = state.cancellation.cancel(&claims.requester()?, req).await?;

    state.events.seats_changed(
        reservation.schedule_id,
        &reservation.seat_ids,
        reservation.id,
        SeatEventKind::Released,
    );

    Ok(Json(ReservationCanceled {
        reservation_id: reservation.id,
        status: reservation.status.as_str(),
    }))
}
