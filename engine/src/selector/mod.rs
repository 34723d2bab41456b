//! Prize selection
//!
//! Two-level weighted sampling: first a tier from the resolved weight
//! vector, then a prize within the tier from the per-prize weights. A tier
//! that turns out to have no available prize redirects to fallback, the
//! only place tier selection is overridden inside the selector itself.
//!
//! Availability is computed once per draw into an [`AvailabilitySet`]:
//! active prizes whose stock sits above the tier's hard floor, in tiers
//! whose per-user daily cap has not been reached.

use crate::models::campaign::{Prize, Stock, Tier};
use crate::models::config::CampaignPolicy;
use crate::models::state::UserCampaignState;
use crate::policy::WeightVector;
use crate::rng::DrawRng;

/// Prizes eligible for award right now, grouped by tier.
#[derive(Debug)]
pub struct AvailabilitySet<'a> {
    per_tier: [Vec<&'a Prize>; 4],
}

impl<'a> AvailabilitySet<'a> {
    /// Build from the policy catalogue plus a stock lookup.
    ///
    /// `stock_of` returns the live remaining stock for a prize id; prizes
    /// with no inventory entry are treated as unavailable.
    pub fn build(
        policy: &'a CampaignPolicy,
        user: &UserCampaignState,
        stock_of: impl Fn(&str) -> Option<Stock>,
    ) -> Self {
        let mut per_tier: [Vec<&'a Prize>; 4] = Default::default();
        for tier in Tier::ALL {
            let rule = policy.tier_rule(tier);
            if let Some(cap) = rule.daily_cap_per_user {
                if user.awards_today(tier) >= cap {
                    continue;
                }
            }
            per_tier[tier.index()] = policy
                .prizes_in_tier(tier)
                .filter(|p| {
                    stock_of(&p.id)
                        .map(|s| s.above_floor(rule.hard_stock_floor))
                        .unwrap_or(false)
                })
                .collect();
        }
        Self { per_tier }
    }

    pub fn available(&self, tier: Tier) -> &[&'a Prize] {
        &self.per_tier[tier.index()]
    }

    pub fn has_any(&self, tier: Tier) -> bool {
        !self.per_tier[tier.index()].is_empty()
    }

    /// Lowest prize value in a tier, for the effective-budget check.
    pub fn cheapest_value(&self, tier: Tier) -> Option<i64> {
        self.per_tier[tier.index()].iter().map(|p| p.value).min()
    }
}

/// Weighted sample of a tier. `None` when the vector has no mass.
pub fn sample_tier(rng: &mut DrawRng, weights: &WeightVector) -> Option<Tier> {
    let total = weights.total();
    if total == 0 {
        return None;
    }
    let mut pick = rng.range_u64(total);
    for tier in Tier::ALL {
        let w = weights.get(tier);
        if pick < w {
            return Some(tier);
        }
        pick -= w;
    }
    // Unreachable: pick < total and the loop consumes exactly total.
    None
}

/// Weighted sample of a prize from a non-empty candidate list.
///
/// A zero weight-sum (possible when a tier's rule weight is zero but the
/// guard forced the tier anyway) falls back to a uniform pick.
pub fn sample_prize<'a>(rng: &mut DrawRng, candidates: &[&'a Prize]) -> Option<&'a Prize> {
    if candidates.is_empty() {
        return None;
    }
    let total: u64 = candidates.iter().map(|p| p.base_weight).sum();
    if total == 0 {
        let idx = rng.range_u64(candidates.len() as u64) as usize;
        return Some(candidates[idx]);
    }
    let mut pick = rng.range_u64(total);
    for prize in candidates {
        if pick < prize.base_weight {
            return Some(prize);
        }
        pick -= prize.base_weight;
    }
    None
}
