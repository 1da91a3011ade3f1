pub mod engine;
pub mod error;
pub mod lifecycle;

pub use engine::{
    BookingEngine, BookingRules, Reservation, ReservationRequest, SeatAvailability, SeatMapEntry,
    SeatState,
};
pub use error::{BookingError, ErrorKind};
pub use lifecycle::LeadTimePolicy;
