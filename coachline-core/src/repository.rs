use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::notification::DeliveryRecord;
use crate::route::Route;
use crate::user::{DeviceToken, NotificationPreferences, PreferenceUpdate, UserContact};
use crate::CoreResult;

/// Requested seats for one reservation, each mapped to the booking that will own it.
pub type SeatHolds = BTreeMap<u32, Uuid>;

/// Result of an all-or-nothing seat claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(BTreeSet<u32>),
    /// Nothing was claimed; these requested seats are already held.
    Conflict(BTreeSet<u32>),
}

/// Seat Availability Index: which seats are held per (route, travel date).
///
/// Implementations must make `check_and_claim` atomic over the whole set, either
/// through a storage uniqueness constraint or a per-(route, date) critical section.
/// Every claim records its owning booking, and `release` only touches claims
/// owned by the bookings it is given.
#[async_trait]
pub trait SeatClaimStore: Send + Sync {
    async fn check_and_claim(
        &self,
        route_id: Uuid,
        travel_date: NaiveDate,
        holds: &SeatHolds,
    ) -> CoreResult<ClaimOutcome>;

    /// Idempotent: releasing a released, unknown, or re-claimed seat is a no-op.
    async fn release(
        &self,
        route_id: Uuid,
        travel_date: NaiveDate,
        holds: &SeatHolds,
    ) -> CoreResult<()>;

    async fn list_held(&self, route_id: Uuid, travel_date: NaiveDate) -> CoreResult<BTreeSet<u32>>;
}

/// Repository trait for route data access
#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persists all bookings of one reservation, or none of them.
    async fn create_bookings(&self, bookings: &[Booking]) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_user_bookings(&self, user_id: Uuid) -> CoreResult<Vec<Booking>>;

    /// Compare-and-set on status. Returns the updated booking, or `None` when the
    /// stored status was no longer `expected`. Stores that keep seat claims next to
    /// bookings release the claim in the same transaction when moving to CANCELLED.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> CoreResult<Option<Booking>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<UserContact>>;

    async fn active_device_tokens(&self, user_id: Uuid) -> CoreResult<Vec<DeviceToken>>;

    /// Registers a token, or re-activates it and moves it to `user_id` if already known.
    async fn register_device(&self, token: DeviceToken) -> CoreResult<()>;

    async fn deactivate_device_token(&self, token: &str) -> CoreResult<()>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Stored preferences, or the defaults when the user never saved any.
    async fn get_preferences(&self, user_id: Uuid) -> CoreResult<NotificationPreferences>;

    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: PreferenceUpdate,
    ) -> CoreResult<NotificationPreferences>;
}

/// Append-only notification delivery log
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn append(&self, record: &DeliveryRecord) -> CoreResult<()>;

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<DeliveryRecord>>;
}
