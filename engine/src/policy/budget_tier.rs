//! Budget tier resolver
//!
//! Maps the campaign's signed budget debt (positive = spent above plan) to a
//! discrete tier B0..B3. Larger debt means a lower tier; B0 is the catch-all
//! when debt exceeds the top threshold. Thresholds are closed above:
//! `debt <= t` belongs to the tier the threshold names.

use crate::models::config::{BudgetTier, PricingConfig};
use crate::policy::{StageDetail, StageKind, StageTrace, WeightVector};

/// Pure function of (budget debt, pricing config).
///
/// Weights pass through unchanged; the resolved tier feeds the matrix stage.
pub fn resolve(
    budget_debt: i64,
    pricing: &PricingConfig,
    weights: WeightVector,
) -> (BudgetTier, StageTrace) {
    let [b3_max, b2_max, b1_max] = pricing.budget_thresholds;

    let tier = if budget_debt <= b3_max {
        BudgetTier::B3
    } else if budget_debt <= b2_max {
        BudgetTier::B2
    } else if budget_debt <= b1_max {
        BudgetTier::B1
    } else {
        BudgetTier::B0
    };

    let trace = StageTrace {
        stage: StageKind::BudgetTier,
        output: weights,
        degraded: false,
        detail: StageDetail::BudgetTier {
            budget_debt,
            tier,
        },
    };
    (tier, trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::TierMatrix;

    fn pricing(thresholds: [i64; 3]) -> PricingConfig {
        PricingConfig {
            weight_scale: 1_000_000,
            budget_thresholds: thresholds,
            pressure_thresholds: [0, 5_000],
            pressure_window_draws: 100,
            planned_payout_per_draw: 50,
            planned_award_rate_bps: 5_000,
            budget_soft_cap: None,
            matrix: TierMatrix::identity_with_b0_floor(),
        }
    }

    #[test]
    fn test_thresholds_are_closed_above() {
        let cfg = pricing([-10_000, 0, 10_000]);
        let cases = [
            (-20_000, BudgetTier::B3),
            (-10_000, BudgetTier::B3),
            (-9_999, BudgetTier::B2),
            (0, BudgetTier::B2),
            (1, BudgetTier::B1),
            (10_000, BudgetTier::B1),
            (10_001, BudgetTier::B0),
            (i64::MAX, BudgetTier::B0),
        ];
        for (debt, expected) in cases {
            let (tier, trace) = resolve(debt, &cfg, WeightVector::ZERO);
            assert_eq!(tier, expected, "debt {debt}");
            assert!(!trace.degraded);
        }
    }
}
