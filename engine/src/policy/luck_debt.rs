//! Luck-debt calculator
//!
//! Campaign-global correction: when the historical empty rate runs above the
//! configured expectation, non-fallback odds get a clamped boost until the
//! rate converges. Below a minimum sample size the historical rate is noise,
//! so the stage passes through.

use crate::models::config::{LuckDebtConfig, BPS_SCALE};
use crate::models::state::CampaignGlobalState;
use crate::policy::{DebtLevel, StageDetail, StageKind, StageTrace, WeightVector};

/// Apply the luck-debt boost to `weights`.
pub fn apply(
    weights: WeightVector,
    global: &CampaignGlobalState,
    cfg: &LuckDebtConfig,
    scale: u64,
) -> (WeightVector, StageTrace) {
    let passthrough = |deviation_bps: i64| StageTrace {
        stage: StageKind::LuckDebt,
        output: weights,
        degraded: false,
        detail: StageDetail::LuckDebt {
            applied: false,
            deviation_bps,
            level: DebtLevel::None,
            boost_bps: BPS_SCALE,
        },
    };

    if global.cumulative_draws < cfg.sample_sufficient_threshold {
        return (weights, passthrough(0));
    }

    let rate_bps = match global.empty_rate_bps() {
        Some(rate) => rate as i64,
        None => return (weights, passthrough(0)),
    };
    let deviation_bps = rate_bps - cfg.expected_empty_rate_bps as i64;
    if deviation_bps <= 0 {
        return (weights, passthrough(deviation_bps));
    }

    let level = if deviation_bps >= cfg.high_deviation_bps as i64 {
        DebtLevel::High
    } else if deviation_bps >= cfg.medium_deviation_bps as i64 {
        DebtLevel::Medium
    } else {
        DebtLevel::Low
    };

    let raw_boost =
        BPS_SCALE as u64 + (deviation_bps as u64 * cfg.boost_gain_bps as u64) / BPS_SCALE as u64;
    let boost_bps = raw_boost.min(cfg.max_boost_bps as u64) as u32;

    let mut boosted = weights;
    boosted.mul_non_fallback_bps(boost_bps);
    let (output, degraded) = if boosted.total() == 0 {
        (weights, true)
    } else {
        (boosted.normalized(scale), false)
    };

    let trace = StageTrace {
        stage: StageKind::LuckDebt,
        output,
        degraded,
        detail: StageDetail::LuckDebt {
            applied: true,
            deviation_bps,
            level,
            boost_bps,
        },
    };
    (output, trace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LuckDebtConfig {
        LuckDebtConfig {
            sample_sufficient_threshold: 100,
            expected_empty_rate_bps: 5_000,
            boost_gain_bps: 10_000,
            max_boost_bps: 15_000,
            medium_deviation_bps: 300,
            high_deviation_bps: 800,
        }
    }

    fn global(draws: u64, empties: u64) -> CampaignGlobalState {
        let mut state = CampaignGlobalState::new("C1", 10);
        state.cumulative_draws = draws;
        state.cumulative_empties = empties;
        state
    }

    fn base() -> WeightVector {
        WeightVector {
            high: 50_000,
            mid: 150_000,
            low: 300_000,
            fallback: 500_000,
        }
    }

    const SCALE: u64 = 1_000_000;

    #[test]
    fn test_insufficient_sample_passes_through() {
        let (out, trace) = apply(base(), &global(99, 99), &cfg(), SCALE);
        assert_eq!(out, base());
        match trace.detail {
            StageDetail::LuckDebt { applied, .. } => assert!(!applied),
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_rate_at_or_below_expectation_passes_through() {
        // 50% empties == expected
        let (out, _) = apply(base(), &global(200, 100), &cfg(), SCALE);
        assert_eq!(out, base());
    }

    #[test]
    fn test_excess_empty_rate_boosts_non_fallback() {
        // 60% empties, 1000 bps over expectation → boost 2x, clamped to 1.5x
        let (out, trace) = apply(base(), &global(1_000, 600), &cfg(), SCALE);
        assert_eq!(out.total(), SCALE);
        assert!(out.non_fallback_total() > base().non_fallback_total());
        match trace.detail {
            StageDetail::LuckDebt {
                applied,
                deviation_bps,
                level,
                boost_bps,
            } => {
                assert!(applied);
                assert_eq!(deviation_bps, 1_000);
                assert_eq!(level, DebtLevel::High);
                assert_eq!(boost_bps, 15_000, "clamped to ceiling");
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_deviation_banding() {
        // 5200 bps rate → deviation 200 → Low
        let (_, trace) = apply(base(), &global(10_000, 5_200), &cfg(), SCALE);
        match trace.detail {
            StageDetail::LuckDebt { level, .. } => assert_eq!(level, DebtLevel::Low),
            other => panic!("unexpected detail {other:?}"),
        }
        // 5500 bps rate → deviation 500 → Medium
        let (_, trace) = apply(base(), &global(10_000, 5_500), &cfg(), SCALE);
        match trace.detail {
            StageDetail::LuckDebt { level, .. } => assert_eq!(level, DebtLevel::Medium),
            other => panic!("unexpected detail {other:?}"),
        }
    }
}
