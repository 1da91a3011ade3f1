use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use coachline_booking::{Reservation, ReservationRequest, SeatAvailability};
use coachline_core::booking::{Booking, Passenger};
use coachline_shared::models::events::{
    BookingCancelledEvent, BookingCreatedEvent, BOOKING_CANCELLED_TOPIC, BOOKING_CREATED_TOPIC,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{admin_auth_middleware, customer_auth_middleware, AuthUser};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Seat labels arrive as strings; bare numbers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SeatLabel {
    Text(String),
    Number(u64),
}

impl SeatLabel {
    fn into_label(self) -> String {
        match self {
            SeatLabel::Text(s) => s,
            SeatLabel::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub route_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_numbers: Vec<SeatLabel>,
    pub passengers: Vec<Passenger>,
    pub boarding_stop: Option<String>,
    pub alighting_stop: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatQuery {
    pub travel_date: NaiveDate,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/my", get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", put(cancel_booking))
        .route_layer(from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .route("/v1/bookings/{id}/confirm", put(confirm_booking))
        .route_layer(from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/v1/bookings/route/{route_id}/seats", get(seat_availability))
        .merge(customer)
        .merge(admin)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state
        .engine
        .create_reservation(ReservationRequest {
            user_id: user.id,
            route_id: req.route_id,
            travel_date: req.travel_date,
            seat_numbers: req.seat_numbers.into_iter().map(SeatLabel::into_label).collect(),
            passengers: req.passengers,
            boarding_stop: req.boarding_stop,
            alighting_stop: req.alighting_stop,
        })
        .await?;

    if let Some(events) = &state.events {
        let event = BookingCreatedEvent {
            booking_ids: reservation.bookings.iter().map(|b| b.id).collect(),
            user_id: user.id,
            route_id: req.route_id,
            travel_date: req.travel_date,
            seat_numbers: reservation.bookings.iter().map(|b| b.seat_number).collect(),
            total_fare: reservation.pricing.total,
            timestamp: Utc::now().timestamp(),
        };
        events
            .publish_json(BOOKING_CREATED_TOPIC, &req.route_id.to_string(), &event)
            .await;
    }

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /v1/bookings/route/{route_id}/seats?travelDate=YYYY-MM-DD
pub async fn seat_availability(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Query(query): Query<SeatQuery>,
) -> Result<Json<SeatAvailability>, AppError> {
    let seats = state.engine.list_available_seats(route_id, query.travel_date).await?;
    Ok(Json(seats))
}

/// PUT /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.cancel(booking_id, user.id).await?;

    if let Some(events) = &state.events {
        let event = BookingCancelledEvent {
            booking_id: booking.id,
            user_id: booking.user_id,
            route_id: booking.route_id,
            travel_date: booking.travel_date,
            seat_number: booking.seat_number,
            timestamp: Utc::now().timestamp(),
        };
        events
            .publish_json(BOOKING_CANCELLED_TOPIC, &booking.route_id.to_string(), &event)
            .await;
    }

    Ok(Json(booking))
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.engine.get_booking(booking_id, user.id).await?))
}

/// GET /v1/bookings/my
pub async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.engine.list_user_bookings(user.id).await?))
}

/// PUT /v1/bookings/{id}/confirm (operator)
pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.engine.confirm(booking_id).await?))
}
