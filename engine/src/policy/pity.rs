//! Pity calculator
//!
//! Raises a user's odds after consecutive empty outcomes. The highest soft
//! threshold with `streak <= empty_streak` applies its multiplier to the
//! non-fallback weights. At the hard-pity streak the fallback weight is
//! zeroed and the non-fallback weights are rescaled proportionally, so the
//! draw is forced non-empty.
//!
//! When hard pity collides with a configuration that has already zeroed all
//! non-fallback weights (budget tier B0), the stage degrades to pass-through
//! rather than producing an unsamplable zero vector: the budget floor wins.

use crate::models::campaign::Tier;
use crate::models::config::PityConfig;
use crate::policy::{PityKind, StageDetail, StageKind, StageTrace, WeightVector};

/// Apply pity for `empty_streak` to `weights`.
pub fn apply(
    weights: WeightVector,
    empty_streak: u32,
    pity: &PityConfig,
    scale: u64,
) -> (WeightVector, StageTrace) {
    if empty_streak >= pity.hard_streak {
        return apply_hard(weights, pity, scale);
    }

    match pity.matching_soft(empty_streak) {
        None => {
            let trace = StageTrace {
                stage: StageKind::Pity,
                output: weights,
                degraded: false,
                detail: StageDetail::Pity {
                    kind: PityKind::None,
                    matched_streak: None,
                    multiplier_bps: None,
                },
            };
            (weights, trace)
        }
        Some(level) => {
            let mut boosted = weights;
            boosted.mul_non_fallback_bps(level.multiplier_bps);
            let (output, degraded) = if boosted.total() == 0 {
                (weights, true)
            } else {
                (boosted.normalized(scale), false)
            };
            let trace = StageTrace {
                stage: StageKind::Pity,
                output,
                degraded,
                detail: StageDetail::Pity {
                    kind: PityKind::Soft,
                    matched_streak: Some(level.streak),
                    multiplier_bps: Some(level.multiplier_bps),
                },
            };
            (output, trace)
        }
    }
}

fn apply_hard(weights: WeightVector, pity: &PityConfig, scale: u64) -> (WeightVector, StageTrace) {
    let mut forced = weights;
    forced.set(Tier::Fallback, 0);

    let (output, degraded) = if forced.total() == 0 {
        // No non-fallback mass to rescale; keep the input samplable.
        (weights, true)
    } else {
        (forced.normalized(scale), false)
    };

    let trace = StageTrace {
        stage: StageKind::Pity,
        output,
        degraded,
        detail: StageDetail::Pity {
            kind: PityKind::Hard,
            matched_streak: Some(pity.hard_streak),
            multiplier_bps: None,
        },
    };
    (output, trace)
}
