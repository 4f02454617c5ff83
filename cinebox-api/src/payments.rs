use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::WithRejection;
use cinebox_order::ConfirmPayment;
use cinebox_shared::SeatEventKind;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::MemberClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/payments", post(confirm_payment))
}

#[derive(Debug, Serialize)]
pub struct PaymentConfirmed {
    pub reservation_id: Uuid,
    pub status: &'static str,
    pub saving_point: i64,
}

/// POST /v1/payments
/// Reconcile a gateway receipt with a pending reservation
async fn confirm_payment(
    State(state): State<AppState>,
    claims: MemberClaims,
    WithRejection(Json(req), _): WithRejection<Json<ConfirmPayment>, AppError>,
) -> Result<Json<PaymentConfirmed>, AppError> {
    let member_id = claims.member_id()?;
    let confirmation = state.reconciler.confirm_payment(member_id, req).await?;
    let reservation = confirmation.reservation;

    state.events.seats_changed(
        reservation.schedule_id,
        &reservation.seat_ids,
        reservation.id,
        SeatEventKind::Confirmed,
    );

    Ok(Json(PaymentConfirmed {
        reservation_id: reservation.id,
        status: reservation.status.as_str(),
        saving_point: confirmation.saving_point,
    }))
}
