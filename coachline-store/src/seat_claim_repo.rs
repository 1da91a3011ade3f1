use async_trait::async_trait;
use chrono::NaiveDate;
use coachline_core::repository::{ClaimOutcome, SeatClaimStore, SeatHolds};
use coachline_core::CoreResult;
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage_err;

/// Seconds a claim may stay HELD without a matching `bookings` row.
pub const DEFAULT_CLAIM_TTL_SECONDS: i64 = 300;

/// Seat claims backed by `seat_claims` and its partial unique index on HELD rows.
///
/// A claim inserts every requested seat in one transaction with
/// `ON CONFLICT DO NOTHING`; seats that come back missing from `RETURNING`
/// are already held, and the transaction is rolled back so nothing from the
/// request stays claimed.
///
/// Each row carries the booking id it was claimed for. A HELD row whose booking
/// was never written (the process died between claim and persistence) is an
/// orphan: it stops counting as held once older than the claim TTL, and the
/// next claim on that seat releases it.
pub struct StoreSeatClaims {
    pool: PgPool,
    claim_ttl_seconds: i64,
}

impl StoreSeatClaims {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            claim_ttl_seconds: DEFAULT_CLAIM_TTL_SECONDS,
        }
    }

    pub fn with_claim_ttl(mut self, seconds: i64) -> Self {
        self.claim_ttl_seconds = seconds.max(0);
        self
    }
}

fn split_holds(holds: &SeatHolds) -> (Vec<i32>, Vec<Uuid>) {
    holds.iter().map(|(seat, booking_id)| (*seat as i32, *booking_id)).unzip()
}

#[async_trait]
impl SeatClaimStore for StoreSeatClaims {
    async fn check_and_claim(
        &self,
        route_id: Uuid,
        travel_date: NaiveDate,
        holds: &SeatHolds,
    ) -> CoreResult<ClaimOutcome> {
        let (seats, booking_ids) = split_holds(holds);
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let expired = sqlx::query(
            r#"
            UPDATE seat_claims
            SET status = 'RELEASED', updated_at = NOW()
            WHERE route_id = $1 AND travel_date = $2 AND seat_number = ANY($3)
              AND status = 'HELD'
              AND created_at < NOW() - make_interval(secs => $4)
              AND NOT EXISTS (SELECT 1 FROM bookings b WHERE b.id = seat_claims.booking_id)
            "#,
        )
        .bind(route_id)
        .bind(travel_date)
        .bind(&seats)
        .bind(self.claim_ttl_seconds as f64)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        if expired.rows_affected() > 0 {
            warn!(
                "Released {} orphaned seat claim(s) on route {} for {}",
                expired.rows_affected(),
                route_id,
                travel_date
            );
        }

        let claimed: Vec<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO seat_claims (route_id, travel_date, seat_number, booking_id, status)
            SELECT $1, $2, seat, booking_id, 'HELD'
            FROM UNNEST($3::int4[], $4::uuid[]) AS h(seat, booking_id)
            ON CONFLICT (route_id, travel_date, seat_number) WHERE status = 'HELD' DO NOTHING
            RETURNING seat_number
            "#,
        )
        .bind(route_id)
        .bind(travel_date)
        .bind(&seats)
        .bind(&booking_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_err)?;

        let claimed: BTreeSet<u32> = claimed.into_iter().map(|s| s as u32).collect();
        let taken: BTreeSet<u32> = holds.keys().filter(|s| !claimed.contains(s)).copied().collect();

        if !taken.is_empty() {
            tx.rollback().await.map_err(storage_err)?;
            info!("Seat claim on route {} for {} rejected, taken: {:?}", route_id, travel_date, taken);
            return Ok(ClaimOutcome::Conflict(taken));
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(ClaimOutcome::Claimed(claimed))
    }

    async fn release(&self, route_id: Uuid, travel_date: NaiveDate, holds: &SeatHolds) -> CoreResult<()> {
        let (seats, booking_ids) = split_holds(holds);
        sqlx::query(
            r#"
            UPDATE seat_claims
            SET status = 'RELEASED', updated_at = NOW()
            FROM UNNEST($3::int4[], $4::uuid[]) AS h(seat, booking_id)
            WHERE seat_claims.route_id = $1 AND seat_claims.travel_date = $2
              AND seat_claims.seat_number = h.seat AND seat_claims.booking_id = h.booking_id
              AND seat_claims.status = 'HELD'
            "#,
        )
        .bind(route_id)
        .bind(travel_date)
        .bind(&seats)
        .bind(&booking_ids)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn list_held(&self, route_id: Uuid, travel_date: NaiveDate) -> CoreResult<BTreeSet<u32>> {
        let held: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT c.seat_number
            FROM seat_claims c
            WHERE c.route_id = $1 AND c.travel_date = $2 AND c.status = 'HELD'
              AND (
                EXISTS (SELECT 1 FROM bookings b WHERE b.id = c.booking_id)
                OR c.created_at >= NOW() - make_interval(secs => $3)
              )
            "#,
        )
        .bind(route_id)
        .bind(travel_date)
        .bind(self.claim_ttl_seconds as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(held.into_iter().map(|s| s as u32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_split_into_parallel_arrays_in_seat_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let holds: SeatHolds = [(9, b), (2, a)].into_iter().collect();

        let (seats, owners) = split_holds(&holds);
        assert_eq!(seats, vec![2, 9]);
        assert_eq!(owners, vec![a, b]);
    }
}
