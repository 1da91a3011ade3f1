use chrono::NaiveDate;
use coachline_catalog::{parse_seat_numbers, FareQuote, StopPair};
use coachline_core::booking::{Booking, BookingStatus, Passenger};
use coachline_core::clock::{Clock, SystemClock};
use coachline_core::notification::Channel;
use coachline_core::repository::{BookingRepository, ClaimOutcome, RouteRepository, SeatClaimStore, SeatHolds};
use coachline_core::route::Route;
use coachline_notify::{EventType, NotificationDispatcher, NotificationEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::BookingError;
use crate::lifecycle::{can_transition, LeadTimePolicy};

/// Tunables loaded from `business_rules` / `notifications` config.
#[derive(Debug, Clone)]
pub struct BookingRules {
    pub lead_time: LeadTimePolicy,
    pub max_seats_per_booking: usize,
    pub confirmation_channels: Vec<Channel>,
    pub cancellation_channels: Vec<Channel>,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            lead_time: LeadTimePolicy::default(),
            max_seats_per_booking: 6,
            confirmation_channels: vec![Channel::Email, Channel::Push, Channel::Sms, Channel::InApp],
            cancellation_channels: vec![Channel::Email, Channel::Push, Channel::InApp],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub user_id: Uuid,
    pub route_id: Uuid,
    pub travel_date: NaiveDate,
    pub seat_numbers: Vec<String>,
    pub passengers: Vec<Passenger>,
    pub boarding_stop: Option<String>,
    pub alighting_stop: Option<String>,
}

/// Bookings created by one reservation, one per seat, plus pricing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub bookings: Vec<Booking>,
    pub pricing: FareQuote,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Available,
    Booked,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatMapEntry {
    #[serde(with = "coachline_shared::wire::seat_number")]
    pub seat_number: u32,
    pub status: SeatState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAvailability {
    pub total_seats: u32,
    #[serde(with = "coachline_shared::wire::seat_numbers")]
    pub available_seats: Vec<u32>,
    #[serde(with = "coachline_shared::wire::seat_numbers")]
    pub booked_seats: Vec<u32>,
    pub seat_map: Vec<SeatMapEntry>,
}

/// Booking lifecycle: reserve, confirm, cancel, and seat availability.
pub struct BookingEngine {
    routes: Arc<dyn RouteRepository>,
    bookings: Arc<dyn BookingRepository>,
    seats: Arc<dyn SeatClaimStore>,
    notifier: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    rules: BookingRules,
}

impl BookingEngine {
    pub fn new(
        routes: Arc<dyn RouteRepository>,
        bookings: Arc<dyn BookingRepository>,
        seats: Arc<dyn SeatClaimStore>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            routes,
            bookings,
            seats,
            notifier,
            clock: Arc::new(SystemClock),
            rules: BookingRules::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rules(mut self, rules: BookingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    /// Claims every requested seat or none, then persists one PENDING booking per seat.
    ///
    /// Notification runs after persistence and never fails the reservation.
    pub async fn create_reservation(&self, req: ReservationRequest) -> Result<Reservation, BookingError> {
        if req.seat_numbers.is_empty() || req.seat_numbers.len() != req.passengers.len() {
            return Err(BookingError::SeatCountMismatch {
                seats: req.seat_numbers.len(),
                passengers: req.passengers.len(),
            });
        }
        if req.seat_numbers.len() > self.rules.max_seats_per_booking {
            return Err(BookingError::TooManySeats {
                requested: req.seat_numbers.len(),
                max: self.rules.max_seats_per_booking,
            });
        }

        let route = self.active_route(req.route_id).await?;

        let stops = StopPair {
            boarding: req.boarding_stop.as_deref(),
            alighting: req.alighting_stop.as_deref(),
        };
        let quote = FareQuote::compute(&route, &stops, req.seat_numbers.len() as u32)?;
        let seat_numbers = parse_seat_numbers(&req.seat_numbers, route.capacity)?;

        let now = self.clock.now();
        if route.departure_at(req.travel_date) <= now {
            return Err(BookingError::DepartureClosed(req.travel_date));
        }

        // Seats and passengers pair up in request order.
        let mut bookings = Vec::with_capacity(req.passengers.len());
        for (seat_number, passenger) in seat_numbers.iter().zip(req.passengers.iter()) {
            bookings.push(Booking::new(
                req.user_id,
                route.id,
                *seat_number,
                req.travel_date,
                passenger.clone(),
                quote.boarding_stop.clone(),
                quote.alighting_stop.clone(),
                quote.fare_per_seat,
                quote.currency.clone(),
                now,
            ));
        }
        let holds: SeatHolds = bookings.iter().map(|b| (b.seat_number, b.id)).collect();
        let seats: BTreeSet<u32> = holds.keys().copied().collect();

        match self.seats.check_and_claim(route.id, req.travel_date, &holds).await? {
            ClaimOutcome::Claimed(_) => {}
            ClaimOutcome::Conflict(taken) => {
                info!(
                    "Seat conflict on route {} for {}: {:?}",
                    route.id, req.travel_date, taken
                );
                return Err(BookingError::SeatConflict(taken.into_iter().collect()));
            }
        }

        if let Err(e) = self.bookings.create_bookings(&bookings).await {
            error!("Failed to persist bookings on route {}: {}", route.id, e);
            if let Err(release_err) = self.seats.release(route.id, req.travel_date, &holds).await {
                error!(
                    "Failed to release seats {:?} on route {} after persistence failure: {}",
                    seats, route.id, release_err
                );
            }
            return Err(e.into());
        }

        info!(
            "Reserved seats {:?} on route {} for {} ({} booking(s), total {})",
            seats,
            route.id,
            req.travel_date,
            bookings.len(),
            quote.total
        );

        self.notify_confirmed(&route, &bookings, &quote).await;

        Ok(Reservation { bookings, pricing: quote })
    }

    /// Owner-only cancellation, gated by the lead-time rule. Releases the seat.
    pub async fn cancel(&self, booking_id: Uuid, requesting_user: Uuid) -> Result<Booking, BookingError> {
        let mut booking = self.owned_booking(booking_id, requesting_user).await?;

        // Retries only when the status moved between read and write (e.g. a concurrent confirm).
        for _ in 0..3 {
            if booking.status == BookingStatus::Cancelled {
                return Err(BookingError::AlreadyCancelled(booking.id));
            }

            let route = self.route(booking.route_id).await?;
            let departure = route.departure_at(booking.travel_date);
            if !self.rules.lead_time.permits(departure, self.clock.now()) {
                return Err(BookingError::TooLateToCancel {
                    lead_hours: self.rules.lead_time.lead_hours(),
                });
            }

            if let Some(cancelled) = self
                .bookings
                .transition_status(booking.id, booking.status, BookingStatus::Cancelled)
                .await?
            {
                let hold: SeatHolds = [(cancelled.seat_number, cancelled.id)].into_iter().collect();
                if let Err(e) = self.seats.release(cancelled.route_id, cancelled.travel_date, &hold).await {
                    error!(
                        "Booking {} cancelled but seat {} release failed: {}",
                        cancelled.id, cancelled.seat_number, e
                    );
                }

                info!("Booking {} cancelled, seat {} released", cancelled.id, cancelled.seat_number);
                self.notify_cancelled(&route, &cancelled).await;
                return Ok(cancelled);
            }

            booking = self
                .bookings
                .get_booking(booking_id)
                .await?
                .ok_or(BookingError::BookingNotFound(booking_id))?;
        }

        Err(BookingError::InvalidTransition {
            from: booking.status.to_string(),
            to: BookingStatus::Cancelled.to_string(),
        })
    }

    /// PENDING -> CONFIRMED, on payment capture or operator approval.
    pub async fn confirm(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        if !can_transition(booking.status, BookingStatus::Confirmed) {
            return Err(BookingError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Confirmed.to_string(),
            });
        }

        let route = self.route(booking.route_id).await?;
        if !self
            .rules
            .lead_time
            .permits(route.departure_at(booking.travel_date), self.clock.now())
        {
            return Err(BookingError::TooLateToChange {
                lead_hours: self.rules.lead_time.lead_hours(),
            });
        }

        match self
            .bookings
            .transition_status(booking.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await?
        {
            Some(confirmed) => {
                info!("Booking {} confirmed", confirmed.id);
                Ok(confirmed)
            }
            None => {
                let current = self
                    .bookings
                    .get_booking(booking_id)
                    .await?
                    .map(|b| b.status.to_string())
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                Err(BookingError::InvalidTransition {
                    from: current,
                    to: BookingStatus::Confirmed.to_string(),
                })
            }
        }
    }

    pub async fn get_booking(&self, booking_id: Uuid, requesting_user: Uuid) -> Result<Booking, BookingError> {
        self.owned_booking(booking_id, requesting_user).await
    }

    pub async fn list_user_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_user_bookings(user_id).await?)
    }

    /// Seat map for a departure: held seats are booked, the rest available.
    pub async fn list_available_seats(
        &self,
        route_id: Uuid,
        travel_date: NaiveDate,
    ) -> Result<SeatAvailability, BookingError> {
        let route = self.route(route_id).await?;
        let held = self.seats.list_held(route_id, travel_date).await?;

        let mut available_seats = Vec::new();
        let mut booked_seats = Vec::new();
        let mut seat_map = Vec::with_capacity(route.capacity as usize);

        for seat_number in 1..=route.capacity {
            let status = if held.contains(&seat_number) {
                booked_seats.push(seat_number);
                SeatState::Booked
            } else {
                available_seats.push(seat_number);
                SeatState::Available
            };
            seat_map.push(SeatMapEntry { seat_number, status });
        }

        Ok(SeatAvailability {
            total_seats: route.capacity,
            available_seats,
            booked_seats,
            seat_map,
        })
    }

    async fn route(&self, route_id: Uuid) -> Result<Route, BookingError> {
        self.routes
            .get_route(route_id)
            .await?
            .ok_or(BookingError::RouteNotFound(route_id))
    }

    async fn active_route(&self, route_id: Uuid) -> Result<Route, BookingError> {
        let route = self.route(route_id).await?;
        if !route.is_active {
            return Err(BookingError::RouteInactive(route_id));
        }
        Ok(route)
    }

    async fn owned_booking(&self, booking_id: Uuid, requesting_user: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        if booking.user_id != requesting_user {
            return Err(BookingError::Forbidden(booking_id));
        }
        Ok(booking)
    }

    async fn notify_confirmed(&self, route: &Route, bookings: &[Booking], quote: &FareQuote) {
        let Some(primary) = bookings.first() else {
            return;
        };

        let event = NotificationEvent::new(
            primary.user_id,
            EventType::BookingConfirmed,
            self.rules.confirmation_channels.clone(),
        )
        .with_text(
            "Booking confirmed",
            format!("{} to {} on {}", route.origin, route.destination, primary.travel_date),
        )
        .with_data(serde_json::json!({
            "bookingIds": bookings.iter().map(|b| b.id.to_string()).collect::<Vec<_>>(),
            "routeId": route.id,
            "origin": quote.boarding_stop.clone().unwrap_or_else(|| route.origin.clone()),
            "destination": quote.alighting_stop.clone().unwrap_or_else(|| route.destination.clone()),
            "travelDate": primary.travel_date.to_string(),
            "departureTime": route.departure_time.format("%H:%M").to_string(),
            "seatNumbers": bookings.iter().map(|b| b.seat_number).collect::<Vec<_>>(),
            "passengerName": primary.passenger.name,
            "totalFare": quote.total,
            "currency": quote.currency,
        }));

        self.notify(event).await;
    }

    async fn notify_cancelled(&self, route: &Route, booking: &Booking) {
        let event = NotificationEvent::new(
            booking.user_id,
            EventType::BookingCancelled,
            self.rules.cancellation_channels.clone(),
        )
        .with_text(
            "Booking cancelled",
            format!("{} to {} on {}", route.origin, route.destination, booking.travel_date),
        )
        .with_data(serde_json::json!({
            "bookingId": booking.id.to_string(),
            "routeId": route.id,
            "origin": booking.boarding_stop.clone().unwrap_or_else(|| route.origin.clone()),
            "destination": booking.alighting_stop.clone().unwrap_or_else(|| route.destination.clone()),
            "travelDate": booking.travel_date.to_string(),
            "seatNumber": booking.seat_number,
            "passengerName": booking.passenger.name,
        }));

        self.notify(event).await;
    }

    async fn notify(&self, event: NotificationEvent) {
        match self.notifier.dispatch(&event).await {
            Ok(result) if !result.overall => {
                warn!(
                    "{} notification for user {} partially failed: {:?}",
                    event.event_type, event.user_id, result.per_channel
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!("{} notification for user {} failed: {}", event.event_type, event.user_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
    use coachline_catalog::SeatInventory;
    use coachline_core::clock::FixedClock;
    use coachline_core::memory::{
        InMemoryBookingRepository, InMemoryDeliveryLog, InMemoryPreferenceRepository,
        InMemoryRouteRepository, InMemoryUserRepository,
    };
    use coachline_core::repository::DeliveryLog;
    use coachline_core::route::Stop;
    use coachline_core::user::UserContact;
    use coachline_notify::senders::{InMemoryInbox, LoggingSender};
    use coachline_shared::pii::Masked;

    struct Harness {
        engine: Arc<BookingEngine>,
        clock: Arc<FixedClock>,
        routes: Arc<InMemoryRouteRepository>,
        bookings: Arc<InMemoryBookingRepository>,
        log: Arc<InMemoryDeliveryLog>,
        route_id: Uuid,
        user_id: Uuid,
    }

    fn travel_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 10).unwrap()
    }

    /// Departure of the test route on `travel_date()`.
    fn departure() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 10, 8, 0, 0).unwrap()
    }

    fn test_route(capacity: u32) -> Route {
        let stops = [("Nairobi", 0, 0), ("Mtito Andei", 1, 2000), ("Voi", 2, 5000), ("Mombasa", 3, 9000)]
            .iter()
            .map(|(name, order, price)| Stop {
                name: name.to_string(),
                order: *order,
                price_from_origin: *price,
            })
            .collect();

        Route {
            id: Uuid::new_v4(),
            origin: "Nairobi".to_string(),
            destination: "Mombasa".to_string(),
            stops,
            capacity,
            departure_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            price: 9500,
            currency: "KES".to_string(),
            is_active: true,
        }
    }

    async fn harness(capacity: u32) -> Harness {
        let routes = Arc::new(InMemoryRouteRepository::new());
        let route = test_route(capacity);
        let route_id = route.id;
        routes.insert(route).await.unwrap();

        let users = Arc::new(InMemoryUserRepository::new());
        let user_id = Uuid::new_v4();
        users
            .insert(UserContact {
                id: user_id,
                name: "Otieno".to_string(),
                email: Some(Masked("otieno@example.com".to_string())),
                phone: Some(Masked("+254700000002".to_string())),
            })
            .await;

        let log = Arc::new(InMemoryDeliveryLog::new());
        let dispatcher = NotificationDispatcher::new(
            users.clone(),
            Arc::new(InMemoryPreferenceRepository::new()),
            log.clone(),
        )
        .with_sender(Arc::new(LoggingSender::new(Channel::Email)))
        .with_sender(Arc::new(LoggingSender::new(Channel::Sms)))
        .with_sender(Arc::new(InMemoryInbox::new()));

        let bookings = Arc::new(InMemoryBookingRepository::new());
        let clock = Arc::new(FixedClock::new(departure() - Duration::days(3)));

        let engine = BookingEngine::new(
            routes.clone(),
            bookings.clone(),
            Arc::new(SeatInventory::new()),
            Arc::new(dispatcher),
        )
        .with_clock(clock.clone());

        Harness {
            engine: Arc::new(engine),
            clock,
            routes,
            bookings,
            log,
            route_id,
            user_id,
        }
    }

    fn request(h: &Harness, seats: &[&str]) -> ReservationRequest {
        ReservationRequest {
            user_id: h.user_id,
            route_id: h.route_id,
            travel_date: travel_date(),
            seat_numbers: seats.iter().map(|s| s.to_string()).collect(),
            passengers: seats
                .iter()
                .enumerate()
                .map(|(i, _)| Passenger {
                    name: format!("Passenger {}", i + 1),
                    age: Some(30),
                    gender: None,
                })
                .collect(),
            boarding_stop: None,
            alighting_stop: None,
        }
    }

    #[tokio::test]
    async fn segment_pricing_uses_stop_difference() {
        let h = harness(40).await;
        let mut req = request(&h, &["3", "4"]);
        req.boarding_stop = Some("Mtito Andei".to_string());
        req.alighting_stop = Some("Mombasa".to_string());

        let reservation = h.engine.create_reservation(req).await.unwrap();

        assert_eq!(reservation.pricing.fare_per_seat, 7000);
        assert_eq!(reservation.pricing.total, 14000);
        assert_eq!(reservation.bookings.len(), 2);
        assert!(reservation.bookings.iter().all(|b| b.fare == 7000));
        assert!(reservation.bookings.iter().all(|b| b.status == BookingStatus::Pending));
        assert_eq!(reservation.bookings[0].seat_number, 3);
        assert_eq!(reservation.bookings[0].passenger.name, "Passenger 1");
    }

    #[tokio::test]
    async fn confirmation_is_dispatched_after_reservation() {
        let h = harness(40).await;
        h.engine.create_reservation(request(&h, &["7"])).await.unwrap();

        let records = h.log.list_for_user(h.user_id).await.unwrap();
        // One record per attempted channel, push included (no sender wired).
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.event_type == "BOOKING_CONFIRMED"));
    }

    #[tokio::test]
    async fn notification_failure_does_not_undo_booking() {
        let h = harness(40).await;
        let mut req = request(&h, &["9"]);
        // No user record: every channel fails, the booking stands.
        req.user_id = Uuid::new_v4();

        let reservation = h.engine.create_reservation(req).await.unwrap();
        assert_eq!(reservation.bookings.len(), 1);

        let seats = h.engine.list_available_seats(h.route_id, travel_date()).await.unwrap();
        assert_eq!(seats.booked_seats, vec![9]);
    }

    #[tokio::test]
    async fn overlapping_request_claims_nothing() {
        let h = harness(40).await;
        h.engine.create_reservation(request(&h, &["2"])).await.unwrap();

        let err = h.engine.create_reservation(request(&h, &["1", "2"])).await.unwrap_err();
        assert_eq!(err.conflicting_seats(), Some(&[2][..]));

        let seats = h.engine.list_available_seats(h.route_id, travel_date()).await.unwrap();
        assert_eq!(seats.booked_seats, vec![2]);
        assert!(seats.available_seats.contains(&1));
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_seat_have_one_winner() {
        let h = harness(2).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let engine = h.engine.clone();
            let req = request(&h, &["1"]);
            handles.push(tokio::spawn(async move { engine.create_reservation(req).await }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(reservation) => {
                    winners += 1;
                    assert_eq!(reservation.bookings[0].seat_number, 1);
                }
                Err(BookingError::SeatConflict(seats)) => assert_eq!(seats, vec![1]),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);

        let seats = h.engine.list_available_seats(h.route_id, travel_date()).await.unwrap();
        assert_eq!(seats.total_seats, 2);
        assert_eq!(seats.booked_seats, vec![1]);
        assert_eq!(seats.available_seats, vec![2]);
    }

    #[tokio::test]
    async fn validation_errors_are_reported_before_claiming() {
        let h = harness(40).await;

        let mut mismatch = request(&h, &["1", "2"]);
        mismatch.passengers.pop();
        let err = h.engine.create_reservation(mismatch).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatCountMismatch { seats: 2, passengers: 1 }));

        let err = h.engine.create_reservation(request(&h, &[])).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatCountMismatch { .. }));

        let err = h.engine.create_reservation(request(&h, &["1", "41"])).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidSeatNumber(_)));

        let err = h.engine.create_reservation(request(&h, &["A1"])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut reversed = request(&h, &["5"]);
        reversed.boarding_stop = Some("Voi".to_string());
        reversed.alighting_stop = Some("Nairobi".to_string());
        let err = h.engine.create_reservation(reversed).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidStopPair(_)));

        let too_many = request(&h, &["1", "2", "3", "4", "5", "6", "7"]);
        let err = h.engine.create_reservation(too_many).await.unwrap_err();
        assert!(matches!(err, BookingError::TooManySeats { requested: 7, max: 6 }));

        // Seat 1 was never claimed by the rejected requests.
        let seats = h.engine.list_available_seats(h.route_id, travel_date()).await.unwrap();
        assert!(seats.booked_seats.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_inactive_routes() {
        let h = harness(40).await;

        let mut missing = request(&h, &["1"]);
        missing.route_id = Uuid::new_v4();
        let err = h.engine.create_reservation(missing).await.unwrap_err();
        assert!(matches!(err, BookingError::RouteNotFound(_)));

        let mut inactive = test_route(10);
        inactive.is_active = false;
        let inactive_id = inactive.id;
        h.routes.insert(inactive).await.unwrap();

        let mut req = request(&h, &["1"]);
        req.route_id = inactive_id;
        let err = h.engine.create_reservation(req).await.unwrap_err();
        assert!(matches!(err, BookingError::RouteInactive(_)));
    }

    #[tokio::test]
    async fn departed_bus_cannot_be_booked() {
        let h = harness(40).await;
        h.clock.set(departure() + Duration::minutes(1));

        let err = h.engine.create_reservation(request(&h, &["1"])).await.unwrap_err();
        assert!(matches!(err, BookingError::DepartureClosed(_)));
    }

    #[tokio::test]
    async fn persistence_failure_releases_claims() {
        let h = harness(40).await;
        h.bookings.fail_writes(true);

        let err = h.engine.create_reservation(request(&h, &["5", "6"])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.retryable());

        h.bookings.fail_writes(false);
        let reservation = h.engine.create_reservation(request(&h, &["5", "6"])).await.unwrap();
        assert_eq!(reservation.bookings.len(), 2);
    }

    #[tokio::test]
    async fn cancel_releases_seat_and_second_cancel_is_rejected() {
        let h = harness(40).await;
        let reservation = h.engine.create_reservation(request(&h, &["4"])).await.unwrap();
        let booking_id = reservation.bookings[0].id;

        let cancelled = h.engine.cancel(booking_id, h.user_id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let seats = h.engine.list_available_seats(h.route_id, travel_date()).await.unwrap();
        assert!(seats.available_seats.contains(&4));

        let err = h.engine.cancel(booking_id, h.user_id).await.unwrap_err();
        assert!(matches!(err, BookingError::AlreadyCancelled(_)));

        // Someone else rebooks the seat; the second cancel must not have released it.
        let mut rebook = request(&h, &["4"]);
        rebook.user_id = Uuid::new_v4();
        h.engine.create_reservation(rebook).await.unwrap();
        let _ = h.engine.cancel(booking_id, h.user_id).await;
        let seats = h.engine.list_available_seats(h.route_id, travel_date()).await.unwrap();
        assert_eq!(seats.booked_seats, vec![4]);
    }

    #[tokio::test]
    async fn cancel_window_boundary() {
        let h = harness(40).await;
        let first = h.engine.create_reservation(request(&h, &["1"])).await.unwrap().bookings[0].id;
        let second = h.engine.create_reservation(request(&h, &["2"])).await.unwrap().bookings[0].id;

        h.clock.set(departure() - Duration::hours(2) - Duration::seconds(1));
        assert!(h.engine.cancel(first, h.user_id).await.is_ok());

        h.clock.set(departure() - Duration::hours(1) - Duration::minutes(59) - Duration::seconds(59));
        let err = h.engine.cancel(second, h.user_id).await.unwrap_err();
        assert!(matches!(err, BookingError::TooLateToCancel { lead_hours: 2 }));
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
    }

    #[tokio::test]
    async fn only_the_owner_may_cancel() {
        let h = harness(40).await;
        let booking_id = h.engine.create_reservation(request(&h, &["8"])).await.unwrap().bookings[0].id;

        let err = h.engine.cancel(booking_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, BookingError::Forbidden(_)));

        let err = h.engine.cancel(Uuid::new_v4(), h.user_id).await.unwrap_err();
        assert!(matches!(err, BookingError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn confirm_then_cancel() {
        let h = harness(40).await;
        let booking_id = h.engine.create_reservation(request(&h, &["10"])).await.unwrap().bookings[0].id;

        let confirmed = h.engine.confirm(booking_id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = h.engine.confirm(booking_id).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));

        let cancelled = h.engine.cancel(booking_id, h.user_id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let err = h.engine.confirm(booking_id).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn user_bookings_are_listed_newest_first() {
        let h = harness(40).await;
        h.engine.create_reservation(request(&h, &["1"])).await.unwrap();
        h.clock.set(departure() - Duration::days(2));
        h.engine.create_reservation(request(&h, &["2"])).await.unwrap();

        let bookings = h.engine.list_user_bookings(h.user_id).await.unwrap();
        assert_eq!(bookings.iter().map(|b| b.seat_number).collect::<Vec<_>>(), vec![2, 1]);

        let one = h.engine.get_booking(bookings[0].id, h.user_id).await.unwrap();
        assert_eq!(one.seat_number, 2);
        assert!(h.engine.get_booking(bookings[0].id, Uuid::new_v4()).await.is_err());
    }

    /// Releases the claim inside `transition_status` like the Postgres store does,
    /// then lets a rival claim the seat before the engine's own release runs.
    struct ReleasingBookingRepository {
        inner: InMemoryBookingRepository,
        seats: Arc<SeatInventory>,
        rival: Uuid,
    }

    #[async_trait::async_trait]
    impl BookingRepository for ReleasingBookingRepository {
        async fn create_bookings(&self, bookings: &[Booking]) -> coachline_core::CoreResult<()> {
            self.inner.create_bookings(bookings).await
        }

        async fn get_booking(&self, id: Uuid) -> coachline_core::CoreResult<Option<Booking>> {
            self.inner.get_booking(id).await
        }

        async fn list_user_bookings(&self, user_id: Uuid) -> coachline_core::CoreResult<Vec<Booking>> {
            self.inner.list_user_bookings(user_id).await
        }

        async fn transition_status(
            &self,
            id: Uuid,
            expected: BookingStatus,
            next: BookingStatus,
        ) -> coachline_core::CoreResult<Option<Booking>> {
            let updated = self.inner.transition_status(id, expected, next).await?;
            if let Some(booking) = &updated {
                let own: SeatHolds = [(booking.seat_number, booking.id)].into_iter().collect();
                self.seats.release(booking.route_id, booking.travel_date, &own).await?;
                let rival: SeatHolds = [(booking.seat_number, self.rival)].into_iter().collect();
                self.seats.check_and_claim(booking.route_id, booking.travel_date, &rival).await?;
            }
            Ok(updated)
        }
    }

    #[tokio::test]
    async fn cancel_does_not_release_a_seat_reclaimed_by_another_booking() {
        let routes = Arc::new(InMemoryRouteRepository::new());
        let route = test_route(40);
        let route_id = route.id;
        routes.insert(route).await.unwrap();

        let seats = Arc::new(SeatInventory::new());
        let bookings = Arc::new(ReleasingBookingRepository {
            inner: InMemoryBookingRepository::new(),
            seats: seats.clone(),
            rival: Uuid::new_v4(),
        });
        let dispatcher = NotificationDispatcher::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryPreferenceRepository::new()),
            Arc::new(InMemoryDeliveryLog::new()),
        );
        let engine = BookingEngine::new(routes, bookings, seats.clone(), Arc::new(dispatcher))
            .with_clock(Arc::new(FixedClock::new(departure() - Duration::days(3))));

        let user_id = Uuid::new_v4();
        let reservation = engine
            .create_reservation(ReservationRequest {
                user_id,
                route_id,
                travel_date: travel_date(),
                seat_numbers: vec!["12".to_string()],
                passengers: vec![Passenger {
                    name: "Wanjiku".to_string(),
                    age: None,
                    gender: None,
                }],
                boarding_stop: None,
                alighting_stop: None,
            })
            .await
            .unwrap();

        engine.cancel(reservation.bookings[0].id, user_id).await.unwrap();

        let held = seats.list_held(route_id, travel_date()).await.unwrap();
        assert!(held.contains(&12), "rival claim on seat 12 was released");
    }
}
