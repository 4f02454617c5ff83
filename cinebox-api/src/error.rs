use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cinebox_catalog::CatalogError;
use cinebox_order::ReservationError;
use serde_json::json;

/// Marks a response whose failure came from the payment gateway
#[derive(Debug, Clone, Copy)]
pub struct UpstreamFailure;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Reservation(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.code(), e.to_string()),
            AppError::Reservation(e) => {
                tracing::error!("Reservation backend failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.code(), "Internal Server Error".to_string())
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "NotAuthenticated", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "InvalidRequest", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", "Internal Server Error".to_string())
            }
        }
    }

    fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            AppError::Reservation(
                ReservationError::FailToGetAccessToken(_)
                    | ReservationError::VerifyRequestFail(_)
                    | ReservationError::PaymentCancelFail(_)
            )
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, detail) = self.parts();

        let body = Json(json!({
            "status": status.as_u16(),
            "code": code,
            "detail": detail,
        }));

        let mut response = (status, body).into_response();
        if self.is_upstream_failure() {
            response.extensions_mut().insert(UpstreamFailure);
        }
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for AppError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<cinebox_order::LedgerError> for AppError {
    fn from(err: cinebox_order::LedgerError) -> Self {
        AppError::Reservation(err.into())
    }
}
