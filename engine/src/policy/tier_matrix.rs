//! Tier matrix calculator
//!
//! Looks up the (budget tier, pressure tier) cell of the multiplier matrix,
//! applies it elementwise to the tier weights, filters out tiers whose
//! multiplier is zero and renormalises to the configured scale.
//!
//! Validation guarantees the fallback multiplier is never zero, so the
//! result always has positive total: fallback stays reachable even at B0,
//! where every non-fallback multiplier is zero.

use crate::models::config::{BudgetTier, PressureTier, PricingConfig};
use crate::policy::{StageDetail, StageKind, StageTrace, WeightVector};

/// Apply the matrix cell for `(budget, pressure)` to `weights`.
pub fn apply(
    weights: WeightVector,
    budget: BudgetTier,
    pressure: PressureTier,
    pricing: &PricingConfig,
) -> (WeightVector, StageTrace) {
    let cell = pricing.matrix.get(budget, pressure);
    let multiplied = weights.mul_cell(cell);

    // A zero total here means the config slipped past validation (or the
    // base weights were degenerate); calculators never fail, so pass the
    // input through and flag the trace.
    let (output, degraded) = if multiplied.total() == 0 {
        (weights, true)
    } else {
        (multiplied.normalized(pricing.weight_scale), false)
    };

    let trace = StageTrace {
        stage: StageKind::TierMatrix,
        output,
        degraded,
        detail: StageDetail::TierMatrix {
            budget,
            pressure,
            multipliers: *cell,
        },
    };
    (output, trace)
}
