use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coachline_core::repository::{ClaimOutcome, SeatClaimStore, SeatHolds};
use coachline_core::CoreResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Held,
    Released,
}

#[derive(Debug, Clone)]
struct SeatClaim {
    booking_id: Uuid,
    status: ClaimStatus,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

/// Claims for one (route, travel date).
#[derive(Debug, Default)]
struct Partition {
    claims: HashMap<u32, SeatClaim>,
}

impl Partition {
    fn is_held(&self, seat: u32) -> bool {
        matches!(self.claims.get(&seat), Some(c) if c.status == ClaimStatus::Held)
    }
}

type PartitionKey = (Uuid, NaiveDate);

/// In-process seat index.
///
/// Each (route, travel date) gets its own async mutex, held across the whole
/// check-and-claim, so concurrent requests for the same departure serialize while
/// different departures proceed in parallel.
#[derive(Default)]
pub struct SeatInventory {
    partitions: Mutex<HashMap<PartitionKey, Arc<tokio::sync::Mutex<Partition>>>>,
}

impl SeatInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, route_id: Uuid, travel_date: NaiveDate) -> Arc<tokio::sync::Mutex<Partition>> {
        let mut guard = self.partitions.lock().unwrap_or_else(|e| e.into_inner());
        guard.entry((route_id, travel_date)).or_default().clone()
    }
}

#[async_trait]
impl SeatClaimStore for SeatInventory {
    async fn check_and_claim(
        &self,
        route_id: Uuid,
        travel_date: NaiveDate,
        holds: &SeatHolds,
    ) -> CoreResult<ClaimOutcome> {
        let partition = self.partition(route_id, travel_date);
        let mut partition = partition.lock().await;

        let conflicts: BTreeSet<u32> = holds
            .keys()
            .copied()
            .filter(|seat| partition.is_held(*seat))
            .collect();

        if !conflicts.is_empty() {
            debug!("Claim on route {} for {} conflicts on {:?}", route_id, travel_date, conflicts);
            return Ok(ClaimOutcome::Conflict(conflicts));
        }

        let now = Utc::now();
        for (seat, booking_id) in holds {
            partition.claims.insert(
                *seat,
                SeatClaim {
                    booking_id: *booking_id,
                    status: ClaimStatus::Held,
                    updated_at: now,
                },
            );
        }

        Ok(ClaimOutcome::Claimed(holds.keys().copied().collect()))
    }

    async fn release(
        &self,
        route_id: Uuid,
        travel_date: NaiveDate,
        holds: &SeatHolds,
    ) -> CoreResult<()> {
        let partition = self.partition(route_id, travel_date);
        let mut partition = partition.lock().await;

        let now = Utc::now();
        for (seat, booking_id) in holds {
            if let Some(claim) = partition.claims.get_mut(seat) {
                if claim.status == ClaimStatus::Held && claim.booking_id == *booking_id {
                    claim.status = ClaimStatus::Released;
                    claim.updated_at = now;
                }
            }
        }

        Ok(())
    }

    async fn list_held(&self, route_id: Uuid, travel_date: NaiveDate) -> CoreResult<BTreeSet<u32>> {
        let partition = self.partition(route_id, travel_date);
        let partition = partition.lock().await;

        Ok(partition
            .claims
            .iter()
            .filter(|(_, claim)| claim.status == ClaimStatus::Held)
            .map(|(seat, _)| *seat)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(seats: &[u32]) -> BTreeSet<u32> {
        seats.iter().copied().collect()
    }

    /// Each seat owned by the same booking id.
    fn holds(seats: &[u32], owner: Uuid) -> SeatHolds {
        seats.iter().map(|s| (*s, owner)).collect()
    }

    fn fresh(seats: &[u32]) -> SeatHolds {
        holds(seats, Uuid::new_v4())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 10).unwrap()
    }

    #[tokio::test]
    async fn claim_is_all_or_nothing() {
        let inventory = SeatInventory::new();
        let route = Uuid::new_v4();

        inventory.check_and_claim(route, date(), &fresh(&[2])).await.unwrap();

        let outcome = inventory.check_and_claim(route, date(), &fresh(&[1, 2])).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Conflict(set(&[2])));

        // Seat 1 must not have been claimed by the failed request.
        assert_eq!(inventory.list_held(route, date()).await.unwrap(), set(&[2]));
    }

    #[tokio::test]
    async fn release_is_idempotent_and_frees_the_seat() {
        let inventory = SeatInventory::new();
        let route = Uuid::new_v4();

        let owner = Uuid::new_v4();

        inventory.check_and_claim(route, date(), &holds(&[4], owner)).await.unwrap();
        inventory.release(route, date(), &holds(&[4], owner)).await.unwrap();
        inventory.release(route, date(), &holds(&[4], owner)).await.unwrap();
        inventory.release(route, date(), &fresh(&[9])).await.unwrap();

        assert!(inventory.list_held(route, date()).await.unwrap().is_empty());

        let outcome = inventory.check_and_claim(route, date(), &fresh(&[4])).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed(set(&[4])));
    }

    #[tokio::test]
    async fn dates_and_routes_are_independent() {
        let inventory = SeatInventory::new();
        let route = Uuid::new_v4();
        let next_day = date().succ_opt().unwrap();

        inventory.check_and_claim(route, date(), &fresh(&[1])).await.unwrap();
        let other_day = inventory.check_and_claim(route, next_day, &fresh(&[1])).await.unwrap();
        let other_route = inventory.check_and_claim(Uuid::new_v4(), date(), &fresh(&[1])).await.unwrap();

        assert!(matches!(other_day, ClaimOutcome::Claimed(_)));
        assert!(matches!(other_route, ClaimOutcome::Claimed(_)));
    }

    #[tokio::test]
    async fn concurrent_claims_have_a_single_winner() {
        let inventory = Arc::new(SeatInventory::new());
        let route = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let inventory = inventory.clone();
            handles.push(tokio::spawn(async move {
                inventory.check_and_claim(route, date(), &fresh(&[1, 2])).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimOutcome::Claimed(_) => winners += 1,
                ClaimOutcome::Conflict(seats) => assert_eq!(seats, set(&[1, 2])),
            }
        }

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn stale_release_leaves_a_new_owner_alone() {
        let inventory = SeatInventory::new();
        let route = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        inventory.check_and_claim(route, date(), &holds(&[3], first)).await.unwrap();
        inventory.release(route, date(), &holds(&[3], first)).await.unwrap();
        inventory.check_and_claim(route, date(), &holds(&[3], second)).await.unwrap();

        // A late second release from the first owner must not free the seat.
        inventory.release(route, date(), &holds(&[3], first)).await.unwrap();
        assert_eq!(inventory.list_held(route, date()).await.unwrap(), set(&[3]));
    }
}
