use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use cinebox_order::{HistoryEntry, HistoryFilter, HistorySummary};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::MemberClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/members/me/reservations", get(my_reservations))
        .route("/v1/members/me/summary", get(my_summary))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub status: HistoryFilter,
}

async fn my_reservations(
    State(state): State<AppState>,
    claims: MemberClaims,
    WithRejection(Query(query), _): WithRejection<Query<HistoryQuery>, AppError>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let entries = state
        .history
        .history(claims.member_id()?, query.status, Utc::now())
        .await?;
    Ok(Json(entries))
}

async fn my_summary(
    State(state): State<AppState>,
    claims: MemberClaims,
) -> Result<Json<HistorySummary>, AppError> {
    let summary = state.history.summary(claims.member_id()?, Utc::now()).await?;
    Ok(Json(summary))
}
