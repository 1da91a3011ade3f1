use chrono::{DateTime, Duration, Utc};
use coachline_core::booking::BookingStatus;

/// Allowed status edges. CANCELLED is terminal.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    matches!(
        (from, to),
        (BookingStatus::Pending, BookingStatus::Confirmed)
            | (BookingStatus::Pending, BookingStatus::Cancelled)
            | (BookingStatus::Confirmed, BookingStatus::Cancelled)
    )
}

/// Minimum time between now and departure for any status change.
#[derive(Debug, Clone, Copy)]
pub struct LeadTimePolicy {
    pub min_lead: Duration,
}

impl LeadTimePolicy {
    pub fn hours(hours: i64) -> Self {
        Self { min_lead: Duration::hours(hours) }
    }

    /// True when `departure` is at least `min_lead` after `now`.
    pub fn permits(&self, departure: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        departure - now >= self.min_lead
    }

    pub fn lead_hours(&self) -> i64 {
        self.min_lead.num_hours()
    }
}

impl Default for LeadTimePolicy {
    fn default() -> Self {
        Self::hours(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn departure() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn two_hour_boundary() {
        let policy = LeadTimePolicy::default();
        let dep = departure();

        let just_outside = dep - Duration::hours(2) - Duration::seconds(1);
        let just_inside = dep - Duration::hours(1) - Duration::minutes(59) - Duration::seconds(59);

        assert!(policy.permits(dep, just_outside));
        assert!(policy.permits(dep, dep - Duration::hours(2)));
        assert!(!policy.permits(dep, just_inside));
        assert!(!policy.permits(dep, dep + Duration::minutes(5)));
    }

    #[test]
    fn cancelled_is_terminal() {
        for to in [BookingStatus::Pending, BookingStatus::Confirmed, BookingStatus::Cancelled] {
            assert!(!can_transition(BookingStatus::Cancelled, to));
        }
        assert!(can_transition(BookingStatus::Pending, BookingStatus::Confirmed));
        assert!(can_transition(BookingStatus::Confirmed, BookingStatus::Cancelled));
        assert!(!can_transition(BookingStatus::Confirmed, BookingStatus::Pending));
    }
}
