//! Tier-resolution pipeline
//!
//! The draw pipeline is a fold over pure stages. Each stage takes the prior
//! stage's weight vector plus immutable state and returns a new vector and a
//! structured trace entry; no stage mutates persistent state and no stage
//! returns an error: invalid inputs degrade to pass-through with the trace
//! flagged. The orchestrator is the only component that acts on the result.
//!
//! Stage order: budget tier → pressure tier → tier matrix → pity →
//! luck debt. The two streak guards in [`streak_guards`] run after prize
//! selection, not in this fold.

pub mod budget_tier;
pub mod luck_debt;
pub mod pity;
pub mod pressure_tier;
pub mod streak_guards;
pub mod tier_matrix;

pub use streak_guards::{guard_empty_streak, guard_high_streak, GuardTrace, SkipReason};

use crate::models::campaign::Tier;
use crate::models::config::{BudgetTier, CampaignPolicy, PressureTier, TierMultipliers};
use crate::models::state::{CampaignGlobalState, UserCampaignState};
use serde::{Deserialize, Serialize};

/// Integer weights per tier.
///
/// After every stage the vector is renormalised so the components sum to the
/// campaign's `weight_scale`; a component of zero means the tier is
/// unavailable and can never gain mass back through renormalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightVector {
    pub high: u64,
    pub mid: u64,
    pub low: u64,
    pub fallback: u64,
}

impl WeightVector {
    pub const ZERO: WeightVector = WeightVector {
        high: 0,
        mid: 0,
        low: 0,
        fallback: 0,
    };

    pub fn get(&self, tier: Tier) -> u64 {
        match tier {
            Tier::High => self.high,
            Tier::Mid => self.mid,
            Tier::Low => self.low,
            Tier::Fallback => self.fallback,
        }
    }

    pub fn set(&mut self, tier: Tier, weight: u64) {
        match tier {
            Tier::High => self.high = weight,
            Tier::Mid => self.mid = weight,
            Tier::Low => self.low = weight,
            Tier::Fallback => self.fallback = weight,
        }
    }

    pub fn total(&self) -> u64 {
        self.high + self.mid + self.low + self.fallback
    }

    pub fn non_fallback_total(&self) -> u64 {
        self.high + self.mid + self.low
    }

    /// Multiply one component by a basis-point factor (10_000 = identity).
    pub fn mul_tier_bps(&mut self, tier: Tier, bps: u32) {
        let scaled = (self.get(tier) as u128 * bps as u128 / 10_000) as u64;
        self.set(tier, scaled);
    }

    /// Multiply every non-fallback component by a basis-point factor.
    pub fn mul_non_fallback_bps(&mut self, bps: u32) {
        for tier in [Tier::High, Tier::Mid, Tier::Low] {
            self.mul_tier_bps(tier, bps);
        }
    }

    /// Elementwise multiply by a matrix cell.
    pub fn mul_cell(&self, cell: &TierMultipliers) -> WeightVector {
        let mut out = *self;
        for tier in Tier::ALL {
            out.mul_tier_bps(tier, cell.get(tier));
        }
        out
    }

    /// Renormalise so the components sum to exactly `scale`, preserving
    /// proportions via largest-remainder rounding. Components that are zero
    /// stay zero. A zero-total vector is returned unchanged (degenerate;
    /// callers flag it).
    pub fn normalized(&self, scale: u64) -> WeightVector {
        let total = self.total();
        if total == 0 || scale == 0 {
            return *self;
        }

        let mut floors = [0u64; 4];
        let mut remainders: [(usize, u128); 4] = [(0, 0); 4];
        let mut assigned = 0u64;
        for (i, tier) in Tier::ALL.iter().enumerate() {
            let exact = self.get(*tier) as u128 * scale as u128;
            floors[i] = (exact / total as u128) as u64;
            remainders[i] = (i, exact % total as u128);
            assigned += floors[i];
        }

        // Distribute the rounding shortfall to the largest remainders;
        // ties break by tier order for determinism.
        remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut leftover = scale - assigned;
        for (i, _) in remainders {
            if leftover == 0 {
                break;
            }
            floors[i] += 1;
            leftover -= 1;
        }

        WeightVector {
            high: floors[0],
            mid: floors[1],
            low: floors[2],
            fallback: floors[3],
        }
    }
}

/// Which pipeline stage produced a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    BudgetTier,
    PressureTier,
    TierMatrix,
    Pity,
    LuckDebt,
}

/// Pity outcome classification for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PityKind {
    None,
    Soft,
    Hard,
}

/// Luck-debt severity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtLevel {
    None,
    Low,
    Medium,
    High,
}

/// Stage-specific trace payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StageDetail {
    BudgetTier {
        budget_debt: i64,
        tier: BudgetTier,
    },
    PressureTier {
        pressure: i64,
        window_len: usize,
        tier: PressureTier,
    },
    TierMatrix {
        budget: BudgetTier,
        pressure: PressureTier,
        multipliers: TierMultipliers,
    },
    Pity {
        kind: PityKind,
        matched_streak: Option<u32>,
        multiplier_bps: Option<u32>,
    },
    LuckDebt {
        applied: bool,
        deviation_bps: i64,
        level: DebtLevel,
        boost_bps: u32,
    },
}

/// One stage's contribution to the decision snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: StageKind,

    /// Weight vector after this stage
    pub output: WeightVector,

    /// Stage ran on invalid inputs and passed weights through unchanged
    pub degraded: bool,

    pub detail: StageDetail,
}

/// Result of the full tier-resolution fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightResolution {
    pub budget_tier: BudgetTier,
    pub pressure_tier: PressureTier,
    pub base: WeightVector,
    pub final_weights: WeightVector,
    pub stages: Vec<StageTrace>,
}

/// Base weights from the campaign's tier rules.
pub fn base_weights(policy: &CampaignPolicy) -> WeightVector {
    let mut weights = WeightVector::ZERO;
    for tier in Tier::ALL {
        weights.set(tier, policy.tier_rule(tier).base_weight);
    }
    weights
}

/// Run the five-stage fold. Pure: reads policy and state, writes nothing.
pub fn resolve_weights(
    policy: &CampaignPolicy,
    user: &UserCampaignState,
    global: &CampaignGlobalState,
) -> WeightResolution {
    let scale = policy.pricing.weight_scale;
    let base = base_weights(policy).normalized(scale);
    let mut stages = Vec::with_capacity(5);

    let (budget, budget_trace) = budget_tier::resolve(global.budget_debt, &policy.pricing, base);
    stages.push(budget_trace);

    let (pressure, pressure_trace) = pressure_tier::resolve(&global.window, &policy.pricing, base);
    stages.push(pressure_trace);

    let (after_matrix, matrix_trace) =
        tier_matrix::apply(base, budget, pressure, &policy.pricing);
    stages.push(matrix_trace);

    let (after_pity, pity_trace) =
        pity::apply(after_matrix, user.empty_streak, &policy.pity, scale);
    stages.push(pity_trace);

    let (final_weights, luck_trace) =
        luck_debt::apply(after_pity, global, &policy.luck_debt, scale);
    stages.push(luck_trace);

    WeightResolution {
        budget_tier: budget,
        pressure_tier: pressure,
        base,
        final_weights,
        stages,
    }
}
