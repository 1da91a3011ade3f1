use coachline_catalog::CatalogError;
use coachline_core::CoreError;
use serde::Serialize;
use uuid::Uuid;

/// Caller-facing classification of a booking failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    BusinessRule,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Route not found: {0}")]
    RouteNotFound(Uuid),

    #[error("Route {0} is not active")]
    RouteInactive(Uuid),

    #[error("Seat count mismatch: {seats} seat(s) for {passengers} passenger(s)")]
    SeatCountMismatch { seats: usize, passengers: usize },

    #[error("Too many seats: {requested} requested, at most {max} per booking")]
    TooManySeats { requested: usize, max: usize },

    #[error("{0}")]
    InvalidSeatNumber(String),

    #[error("Invalid stop pair: {0}")]
    InvalidStopPair(String),

    #[error("Seats already taken: {}", format_seats(.0))]
    SeatConflict(Vec<u32>),

    #[error("Departure on {0} has already left")]
    DepartureClosed(chrono::NaiveDate),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Booking {0} belongs to another user")]
    Forbidden(Uuid),

    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("Too late to cancel: departure is less than {lead_hours} hour(s) away")]
    TooLateToCancel { lead_hours: i64 },

    #[error("Too late to change booking: departure is less than {lead_hours} hour(s) away")]
    TooLateToChange { lead_hours: i64 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage failure: {0}")]
    Storage(#[from] CoreError),
}

fn format_seats(seats: &[u32]) -> String {
    seats.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
}

impl From<CatalogError> for BookingError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidStopPair(msg) => BookingError::InvalidStopPair(msg),
            other => BookingError::InvalidSeatNumber(other.to_string()),
        }
    }
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::SeatCountMismatch { .. }
            | BookingError::TooManySeats { .. }
            | BookingError::InvalidSeatNumber(_)
            | BookingError::InvalidStopPair(_) => ErrorKind::Validation,
            BookingError::RouteNotFound(_) | BookingError::BookingNotFound(_) => ErrorKind::NotFound,
            BookingError::SeatConflict(_) => ErrorKind::Conflict,
            BookingError::Forbidden(_) => ErrorKind::Forbidden,
            BookingError::RouteInactive(_)
            | BookingError::DepartureClosed(_)
            | BookingError::AlreadyCancelled(_)
            | BookingError::TooLateToCancel { .. }
            | BookingError::TooLateToChange { .. }
            | BookingError::InvalidTransition { .. } => ErrorKind::BusinessRule,
            BookingError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Conflicts are retryable with different seats; internal failures as-is.
    /// Everything else needs the caller to change the request.
    pub fn retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Internal)
    }

    pub fn conflicting_seats(&self) -> Option<&[u32]> {
        match self {
            BookingError::SeatConflict(seats) => Some(seats),
            _ => None,
        }
    }
}
