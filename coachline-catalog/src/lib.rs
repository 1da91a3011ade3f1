pub mod inventory;
pub mod pricing;
pub mod seat;

pub use inventory::{ClaimStatus, SeatInventory};
pub use pricing::{FareQuote, StopPair};
pub use seat::parse_seat_numbers;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Invalid seat number: {0}")]
    InvalidSeatNumber(String),

    #[error("Seat {0} requested more than once")]
    DuplicateSeat(u32),

    #[error("Invalid stop pair: {0}")]
    InvalidStopPair(String),
}
