use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coachline_booking::{BookingError, ErrorKind};
use coachline_core::CoreError;
use coachline_notify::DispatchError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Storage(#[from] CoreError),
    #[error("{0}")]
    ValidationError(String),
}

impl AppError {
    fn kind(&self) -> ErrorKind {
        match self {
            AppError::Booking(e) => e.kind(),
            AppError::ValidationError(_) => ErrorKind::Validation,
            AppError::Storage(CoreError::ValidationError(_)) => ErrorKind::Validation,
            AppError::Dispatch(_) | AppError::Storage(_) => ErrorKind::Internal,
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::BusinessRule => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        let message = if kind == ErrorKind::Internal {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": message,
            "code": kind,
        });
        if let AppError::Booking(e) = &self {
            if let Some(seats) = e.conflicting_seats() {
                body["conflictingSeats"] = json!(seats.iter().map(|s| s.to_string()).collect::<Vec<_>>());
            }
        }

        (status, Json(body)).into_response()
    }
}
