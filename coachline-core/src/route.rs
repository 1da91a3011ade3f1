use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// A stop along a route. `price_from_origin` is cumulative, in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub name: String,
    pub order: i32,
    pub price_from_origin: i32,
}

/// A scheduled service: one bus leaving `origin` at `departure_time` every travel date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub stops: Vec<Stop>,
    pub capacity: u32,
    pub departure_time: NaiveTime,
    /// Full-route fare per seat.
    pub price: i32,
    pub currency: String,
    pub is_active: bool,
}

impl Route {
    /// Checks the stop invariants: order strictly increasing, cumulative price non-decreasing.
    pub fn validate(&self) -> CoreResult<()> {
        if self.capacity == 0 {
            return Err(CoreError::ValidationError(format!(
                "route {} has zero capacity",
                self.id
            )));
        }

        for pair in self.stops.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.order <= prev.order {
                return Err(CoreError::ValidationError(format!(
                    "stop '{}' (order {}) does not follow '{}' (order {})",
                    next.name, next.order, prev.name, prev.order
                )));
            }
            if next.price_from_origin < prev.price_from_origin {
                return Err(CoreError::ValidationError(format!(
                    "stop '{}' is cheaper from origin than '{}'",
                    next.name, prev.name
                )));
            }
        }

        Ok(())
    }

    pub fn find_stop(&self, name: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Departure instant for a travel date. Schedules are kept in UTC.
    pub fn departure_at(&self, travel_date: NaiveDate) -> DateTime<Utc> {
        travel_date.and_time(self.departure_time).and_utc()
    }
}
