use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coachline_core::booking::{Booking, BookingStatus, Passenger};
use coachline_core::repository::BookingRepository;
use coachline_core::{CoreError, CoreResult};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::storage_err;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, route_id, seat_number, travel_date, passenger_name, passenger_age, \
     passenger_gender, boarding_stop, alighting_stop, fare, currency, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    route_id: Uuid,
    seat_number: i32,
    travel_date: NaiveDate,
    passenger_name: String,
    passenger_age: Option<i16>,
    passenger_gender: Option<String>,
    boarding_stop: Option<String>,
    alighting_stop: Option<String>,
    fare: i32,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| CoreError::InternalError(format!("unknown booking status {}", row.status)))?;

        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            route_id: row.route_id,
            seat_number: row.seat_number.max(0) as u32,
            travel_date: row.travel_date,
            passenger: Passenger {
                name: row.passenger_name,
                age: row.passenger_age.and_then(|a| u8::try_from(a).ok()),
                gender: row.passenger_gender,
            },
            boarding_stop: row.boarding_stop,
            alighting_stop: row.alighting_stop,
            fare: row.fare,
            currency: row.currency,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create_bookings(&self, bookings: &[Booking]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for booking in bookings {
            sqlx::query(
                r#"
                INSERT INTO bookings (id, user_id, route_id, seat_number, travel_date, passenger_name,
                    passenger_age, passenger_gender, boarding_stop, alighting_stop, fare, currency,
                    status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(booking.id)
            .bind(booking.user_id)
            .bind(booking.route_id)
            .bind(booking.seat_number as i32)
            .bind(booking.travel_date)
            .bind(&booking.passenger.name)
            .bind(booking.passenger.age.map(i16::from))
            .bind(&booking.passenger.gender)
            .bind(&booking.boarding_stop)
            .bind(&booking.alighting_stop)
            .bind(booking.fare)
            .bind(&booking.currency)
            .bind(booking.status.as_str())
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_user_bookings(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    /// Compare-and-set on status. Moving to CANCELLED releases this booking's own
    /// seat claim in the same transaction; a later claim on the seat is untouched.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> CoreResult<Option<Booking>> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(storage_err)?;
            return Ok(None);
        };

        if !next.holds_seat() {
            sqlx::query(
                r#"
                UPDATE seat_claims
                SET status = 'RELEASED', updated_at = NOW()
                WHERE booking_id = $1 AND status = 'HELD'
                "#,
            )
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        info!("Booking {} moved {} -> {}", id, expected, next);
        Booking::try_from(row).map(Some)
    }
}
