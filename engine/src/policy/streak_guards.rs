//! Post-selection streak guards
//!
//! Two per-user experience guards run after the prize selector has sampled a
//! tier but before the prize is fixed:
//!
//! - the anti-empty guard overrides a fallback selection with a cheap
//!   non-fallback tier once the user's empty streak reaches the force
//!   threshold;
//! - the anti-high guard downgrades a high selection to mid once the user
//!   has hit the cap on consecutive high awards.
//!
//! Both are pure and record a trace entry for the decision snapshot. The
//! trace type also covers the two tier overrides the orchestrator itself can
//! perform (selector redirect, stock-race fallback) so the snapshot keeps
//! one ordered list of every post-sampling correction.

use crate::models::campaign::Tier;
use crate::models::config::CampaignPolicy;
use crate::models::state::{CampaignGlobalState, UserCampaignState};
use crate::policy::WeightVector;
use crate::selector::AvailabilitySet;
use serde::{Deserialize, Serialize};

/// Why a guard declined to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No non-fallback tier had an eligible prize
    NoAvailable,
}

/// One post-sampling tier correction, in application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardTrace {
    /// Anti-empty-streak guard fired (or declined with a reason)
    EmptyStreak {
        forced: bool,
        from: Tier,
        to: Tier,
        reason: Option<SkipReason>,
    },

    /// Anti-high-streak guard downgraded the tier
    HighStreak { from: Tier, to: Tier },

    /// Sampled tier had no available prize; selector redirected to fallback
    SelectorRedirect { from: Tier },

    /// Stock depleted between selection and commit; re-selected in fallback
    StockRace { from: Tier },
}

/// Anti-empty-streak guard.
///
/// Fires only when the sampled tier is fallback and the user's empty streak
/// has reached `force_nonempty_threshold`. Preference order among
/// replacement tiers is low, then mid, then high; a tier qualifies when it
/// is still available in the final weight vector (the matrix zeroes
/// unavailable tiers, and a forced award must never bypass that floor),
/// has an eligible prize (stock above floor, per-tier daily cap not
/// reached), and its cheapest value fits the remaining effective budget.
pub fn guard_empty_streak(
    sampled: Tier,
    policy: &CampaignPolicy,
    user: &UserCampaignState,
    global: &CampaignGlobalState,
    avail: &AvailabilitySet<'_>,
    final_weights: &WeightVector,
) -> (Tier, Option<GuardTrace>) {
    if !sampled.is_fallback() || user.empty_streak < policy.guards.force_nonempty_threshold {
        return (sampled, None);
    }

    let effective_budget = policy
        .pricing
        .budget_soft_cap
        .map(|cap| (cap - global.budget_debt).max(0));

    for tier in [Tier::Low, Tier::Mid, Tier::High] {
        if final_weights.get(tier) == 0 || !avail.has_any(tier) {
            continue;
        }
        if let (Some(budget), Some(cheapest)) = (effective_budget, avail.cheapest_value(tier)) {
            if cheapest > budget {
                continue;
            }
        }
        return (
            tier,
            Some(GuardTrace::EmptyStreak {
                forced: true,
                from: sampled,
                to: tier,
                reason: None,
            }),
        );
    }

    (
        sampled,
        Some(GuardTrace::EmptyStreak {
            forced: false,
            from: sampled,
            to: sampled,
            reason: Some(SkipReason::NoAvailable),
        }),
    )
}

/// Anti-high-streak guard.
///
/// A high selection becomes mid once `high_streak` has reached the cap; mid
/// is never downgraded further.
pub fn guard_high_streak(
    tier: Tier,
    policy: &CampaignPolicy,
    user: &UserCampaignState,
) -> (Tier, Option<GuardTrace>) {
    if tier == Tier::High && user.high_streak >= policy.guards.high_streak_cap {
        (
            Tier::Mid,
            Some(GuardTrace::HighStreak {
                from: Tier::High,
                to: Tier::Mid,
            }),
        )
    } else {
        (tier, None)
    }
}
