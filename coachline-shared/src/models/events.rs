use chrono::NaiveDate;
use uuid::Uuid;

/// Published on `booking.created` once a reservation has committed.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub booking_ids: Vec<Uuid>,
    pub user_id: Uuid,
    pub route_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_numbers: Vec<u32>,
    pub total_fare: i32,
    pub timestamp: i64,
}

/// Published on `booking.cancelled`; downstream seat-map caches listen for it.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub route_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_number: u32,
    pub timestamp: i64,
}

pub const BOOKING_CREATED_TOPIC: &str = "booking.created";
pub const BOOKING_CANCELLED_TOPIC: &str = "booking.cancelled";
