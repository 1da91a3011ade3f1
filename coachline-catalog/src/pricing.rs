use coachline_core::route::Route;
use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Boarding and alighting stop names as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct StopPair<'a> {
    pub boarding: Option<&'a str>,
    pub alighting: Option<&'a str>,
}

/// Per-seat fare and the reservation total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FareQuote {
    pub fare_per_seat: i32,
    pub seat_count: u32,
    pub total: i32,
    pub currency: String,
    pub boarding_stop: Option<String>,
    pub alighting_stop: Option<String>,
}

impl FareQuote {
    /// Segment fare when both stops are given, the full-route fare when neither is.
    pub fn compute(route: &Route, stops: &StopPair<'_>, seat_count: u32) -> Result<Self, CatalogError> {
        let (fare_per_seat, boarding_stop, alighting_stop) = match (stops.boarding, stops.alighting) {
            (None, None) => (route.price, None, None),
            (Some(boarding), Some(alighting)) => {
                let from = route.find_stop(boarding).ok_or_else(|| {
                    CatalogError::InvalidStopPair(format!("'{}' is not a stop on this route", boarding))
                })?;
                let to = route.find_stop(alighting).ok_or_else(|| {
                    CatalogError::InvalidStopPair(format!("'{}' is not a stop on this route", alighting))
                })?;

                if from.order >= to.order {
                    return Err(CatalogError::InvalidStopPair(format!(
                        "boarding '{}' must come before alighting '{}'",
                        from.name, to.name
                    )));
                }

                (
                    to.price_from_origin - from.price_from_origin,
                    Some(from.name.clone()),
                    Some(to.name.clone()),
                )
            }
            _ => {
                return Err(CatalogError::InvalidStopPair(
                    "boarding and alighting stops must be given together".to_string(),
                ))
            }
        };

        Ok(Self {
            fare_per_seat,
            seat_count,
            total: fare_per_seat.saturating_mul(seat_count as i32),
            currency: route.currency.clone(),
            boarding_stop,
            alighting_stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use coachline_core::route::Stop;
    use uuid::Uuid;

    fn route() -> Route {
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
            capacity: 40,
            departure_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            price: 9500,
            currency: "KES".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn segment_fare_is_price_difference() {
        let stops = StopPair { boarding: Some("Mtito Andei"), alighting: Some("Mombasa") };
        let quote = FareQuote::compute(&route(), &stops, 2).unwrap();
        assert_eq!(quote.fare_per_seat, 7000);
        assert_eq!(quote.total, 14000);
        assert_eq!(quote.boarding_stop.as_deref(), Some("Mtito Andei"));
    }

    #[test]
    fn full_route_fare_without_stops() {
        let quote = FareQuote::compute(&route(), &StopPair::default(), 3).unwrap();
        assert_eq!(quote.fare_per_seat, 9500);
        assert_eq!(quote.total, 28500);
    }

    #[test]
    fn rejects_reversed_or_equal_stops() {
        let reversed = StopPair { boarding: Some("Voi"), alighting: Some("Nairobi") };
        assert!(FareQuote::compute(&route(), &reversed, 1).is_err());

        let same = StopPair { boarding: Some("Voi"), alighting: Some("Voi") };
        assert!(FareQuote::compute(&route(), &same, 1).is_err());
    }

    #[test]
    fn rejects_unknown_or_half_given_stops() {
        let unknown = StopPair { boarding: Some("Kisumu"), alighting: Some("Voi") };
        assert!(FareQuote::compute(&route(), &unknown, 1).is_err());

        let half = StopPair { boarding: Some("Voi"), alighting: None };
        assert!(FareQuote::compute(&route(), &half, 1).is_err());
    }
}
