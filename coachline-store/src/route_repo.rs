use async_trait::async_trait;
use chrono::NaiveTime;
use coachline_core::repository::RouteRepository;
use coachline_core::route::{Route, Stop};
use coachline_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::storage_err;

pub struct StoreRouteRepository {
    pool: PgPool,
}

impl StoreRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    origin: String,
    destination: String,
    capacity: i32,
    departure_time: NaiveTime,
    price: i32,
    currency: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct StopRow {
    name: String,
    stop_order: i32,
    price_from_origin: i32,
}

/// Builds a route from its rows and rejects stored data that breaks the stop ordering rules.
fn assemble_route(row: RouteRow, stops: Vec<StopRow>) -> CoreResult<Route> {
    let route = Route {
        id: row.id,
        origin: row.origin,
        destination: row.destination,
        stops: stops
            .into_iter()
            .map(|s| Stop {
                name: s.name,
                order: s.stop_order,
                price_from_origin: s.price_from_origin,
            })
            .collect(),
        capacity: row.capacity.max(0) as u32,
        departure_time: row.departure_time,
        price: row.price,
        currency: row.currency,
        is_active: row.is_active,
    };

    route
        .validate()
        .map_err(|e| CoreError::InternalError(format!("stored route {} is invalid: {}", route.id, e)))?;
    Ok(route)
}

#[async_trait]
impl RouteRepository for StoreRouteRepository {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT id, origin, destination, capacity, departure_time, price, currency, is_active
            FROM routes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stops = sqlx::query_as::<_, StopRow>(
            "SELECT name, stop_order, price_from_origin FROM route_stops WHERE route_id = $1 ORDER BY stop_order",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        assemble_route(row, stops).map(Some)
    }
}
