//! In-memory repositories for tests and local runs without Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::notification::DeliveryRecord;
use crate::repository::{
    BookingRepository, DeliveryLog, PreferenceRepository, RouteRepository, UserRepository,
};
use crate::route::Route;
use crate::user::{DeviceToken, NotificationPreferences, PreferenceUpdate, UserContact};
use crate::{CoreError, CoreResult};

#[derive(Default)]
pub struct InMemoryRouteRepository {
    routes: RwLock<HashMap<Uuid, Route>>,
}

impl InMemoryRouteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, route: Route) -> CoreResult<()> {
        route.validate()?;
        self.routes.write().await.insert(route.id, route);
        Ok(())
    }
}

#[async_trait]
impl RouteRepository for InMemoryRouteRepository {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        Ok(self.routes.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
    fail_writes: AtomicBool,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `create_bookings` calls fail, to exercise rollback paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn create_bookings(&self, bookings: &[Booking]) -> CoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::StorageError("booking store unavailable".to_string()));
        }
        let mut guard = self.bookings.write().await;
        for booking in bookings {
            guard.insert(booking.id, booking.clone());
        }
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_user_bookings(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> CoreResult<Option<Booking>> {
        let mut guard = self.bookings.write().await;
        match guard.get_mut(&id) {
            Some(booking) if booking.status == expected => {
                booking.status = next;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, UserContact>>,
    devices: RwLock<Vec<DeviceToken>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserContact) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn all_device_tokens(&self, user_id: Uuid) -> Vec<DeviceToken> {
        self.devices
            .read()
            .await
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<UserContact>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn active_device_tokens(&self, user_id: Uuid) -> CoreResult<Vec<DeviceToken>> {
        Ok(self
            .devices
            .read()
            .await
            .iter()
            .filter(|d| d.user_id == user_id && d.is_active)
            .cloned()
            .collect())
    }

    async fn register_device(&self, token: DeviceToken) -> CoreResult<()> {
        let mut devices = self.devices.write().await;
        match devices.iter_mut().find(|d| d.token == token.token) {
            Some(existing) => {
                existing.user_id = token.user_id;
                existing.platform = token.platform;
                existing.is_active = true;
                existing.updated_at = token.updated_at;
            }
            None => devices.push(token),
        }
        Ok(())
    }

    async fn deactivate_device_token(&self, token: &str) -> CoreResult<()> {
        let mut devices = self.devices.write().await;
        for device in devices.iter_mut().filter(|d| d.token.expose() == token) {
            device.is_active = false;
            device.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceRepository {
    preferences: RwLock<HashMap<Uuid, NotificationPreferences>>,
}

impl InMemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn get_preferences(&self, user_id: Uuid) -> CoreResult<NotificationPreferences> {
        Ok(self
            .preferences
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: PreferenceUpdate,
    ) -> CoreResult<NotificationPreferences> {
        let mut guard = self.preferences.write().await;
        let entry = guard.entry(user_id).or_default();
        *entry = entry.apply(update);
        Ok(*entry)
    }
}

#[derive(Default)]
pub struct InMemoryDeliveryLog {
    records: RwLock<Vec<DeliveryRecord>>,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn append(&self, record: &DeliveryRecord) -> CoreResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<DeliveryRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
