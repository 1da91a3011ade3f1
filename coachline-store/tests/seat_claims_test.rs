//! Postgres-backed seat claim tests. Need `DATABASE_URL`; run with `cargo test -- --ignored`.

use chrono::{NaiveDate, Utc};
use coachline_core::booking::{Booking, BookingStatus, Passenger};
use coachline_core::repository::{BookingRepository, ClaimOutcome, SeatClaimStore, SeatHolds};
use coachline_store::{StoreBookingRepository, StoreSeatClaims};
use sqlx::PgPool;
use uuid::Uuid;

fn travel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 10).unwrap()
}

async fn insert_route(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO routes (id, origin, destination, capacity, departure_time, price, currency)
         VALUES ($1, 'Nairobi', 'Mombasa', 40, '08:00', 9500, 'KES')",
    )
    .bind(id)
    .execute(pool)
    .await
    .unwrap();
    id
}

fn booking(route_id: Uuid, seat: u32) -> Booking {
    Booking::new(
        Uuid::new_v4(),
        route_id,
        seat,
        travel_date(),
        Passenger {
            name: "Achieng".to_string(),
            age: None,
            gender: None,
        },
        None,
        None,
        9500,
        "KES".to_string(),
        Utc::now(),
    )
}

fn hold(seat: u32, booking_id: Uuid) -> SeatHolds {
    [(seat, booking_id)].into_iter().collect()
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn cancelled_booking_does_not_release_a_rival_claim(pool: PgPool) {
    let route_id = insert_route(&pool).await;
    let claims = StoreSeatClaims::new(pool.clone());
    let bookings = StoreBookingRepository::new(pool.clone());

    let first = booking(route_id, 8);
    claims.check_and_claim(route_id, travel_date(), &hold(8, first.id)).await.unwrap();
    bookings.create_bookings(std::slice::from_ref(&first)).await.unwrap();

    bookings
        .transition_status(first.id, BookingStatus::Pending, BookingStatus::Cancelled)
        .await
        .unwrap()
        .unwrap();

    let rival = booking(route_id, 8);
    let outcome = claims.check_and_claim(route_id, travel_date(), &hold(8, rival.id)).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed(_)));

    // Late release for the cancelled booking.
    claims.release(route_id, travel_date(), &hold(8, first.id)).await.unwrap();

    let held = claims.list_held(route_id, travel_date()).await.unwrap();
    assert!(held.contains(&8));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn orphaned_claim_expires_after_ttl(pool: PgPool) {
    let route_id = insert_route(&pool).await;
    let claims = StoreSeatClaims::new(pool.clone()).with_claim_ttl(0);

    // Claimed, but the booking row is never written.
    claims.check_and_claim(route_id, travel_date(), &hold(3, Uuid::new_v4())).await.unwrap();

    assert!(claims.list_held(route_id, travel_date()).await.unwrap().is_empty());

    let outcome = claims.check_and_claim(route_id, travel_date(), &hold(3, Uuid::new_v4())).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed(_)));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn fresh_unbooked_claim_still_blocks(pool: PgPool) {
    let route_id = insert_route(&pool).await;
    let claims = StoreSeatClaims::new(pool.clone());

    claims.check_and_claim(route_id, travel_date(), &hold(5, Uuid::new_v4())).await.unwrap();

    let outcome = claims.check_and_claim(route_id, travel_date(), &hold(5, Uuid::new_v4())).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Conflict(_)));
    assert!(claims.list_held(route_id, travel_date()).await.unwrap().contains(&5));
}
