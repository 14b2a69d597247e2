//! The account-age tier table (spec §3 `RateTier`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Per-window caps and a human label for a band of account ages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTier {
    pub per_day: u32,
    pub per_hour: u32,
    pub per_minute: u32,
    pub label: Arc<str>,
}

/// One row of the tier table: the inclusive age range it covers and the
/// tier that applies within it. `max_age_days: None` means unbounded
/// (the oldest row).
#[derive(Debug, Clone)]
pub struct TierRow {
    pub min_age_days: i64,
    pub max_age_days: Option<i64>,
    pub tier: RateTier,
}

fn tier(per_day: u32, per_hour: u32, per_minute: u32, label: &str) -> RateTier {
    RateTier {
        per_day,
        per_hour,
        per_minute,
        label: Arc::from(label),
    }
}

/// The default table from spec §3, ordered ascending by age.
#[must_use]
pub fn default_tiers() -> Vec<TierRow> {
    vec![
        TierRow {
            min_age_days: 0,
            max_age_days: Some(3),
            tier: tier(50, 10, 2, "New"),
        },
        TierRow {
            min_age_days: 4,
            max_age_days: Some(7),
            tier: tier(100, 20, 5, "Warming"),
        },
        TierRow {
            min_age_days: 8,
            max_age_days: Some(14),
            tier: tier(200, 40, 10, "Growing"),
        },
        TierRow {
            min_age_days: 15,
            max_age_days: Some(30),
            tier: tier(400, 80, 20, "Established"),
        },
        TierRow {
            min_age_days: 31,
            max_age_days: None,
            tier: tier(1000, 200, 50, "Mature"),
        },
    ]
}

/// Resolve the tier for `account_age_days`. Negative ages clamp to the
/// most restrictive (first) row.
#[must_use]
pub fn tier_for(tiers: &[TierRow], account_age_days: i64) -> RateTier {
    let age = account_age_days.max(0);
    tiers
        .iter()
        .find(|row| age >= row.min_age_days && row.max_age_days.map_or(true, |max| age <= max))
        .map_or_else(
            || tiers.last().expect("tier table is never empty").tier.clone(),
            |row| row.tier.clone(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_resolve_to_expected_rows() {
        let tiers = default_tiers();
        assert_eq!(&*tier_for(&tiers, -5).label, "New");
        assert_eq!(&*tier_for(&tiers, 0).label, "New");
        assert_eq!(&*tier_for(&tiers, 3).label, "New");
        assert_eq!(&*tier_for(&tiers, 4).label, "Warming");
        assert_eq!(&*tier_for(&tiers, 14).label, "Growing");
        assert_eq!(&*tier_for(&tiers, 30).label, "Established");
        assert_eq!(&*tier_for(&tiers, 31).label, "Mature");
        assert_eq!(&*tier_for(&tiers, 10_000).label, "Mature");
    }
}
