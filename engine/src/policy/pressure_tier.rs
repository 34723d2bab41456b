//! Pressure tier resolver
//!
//! Maps the short-window award pressure (reward value paid out minus cost
//! taken in over the rolling window of recent draws) to tiers P0..P2, with
//! P2 the highest pressure (the campaign is paying out too much). Threshold
//! semantics match the budget resolver: closed-above intervals with the top
//! tier as catch-all.

use crate::models::config::{PressureTier, PricingConfig};
use crate::models::state::PressureWindow;
use crate::policy::{StageDetail, StageKind, StageTrace, WeightVector};

/// Pure function of (pressure window, pricing config).
pub fn resolve(
    window: &PressureWindow,
    pricing: &PricingConfig,
    weights: WeightVector,
) -> (PressureTier, StageTrace) {
    let pressure = window.pressure();
    let [p0_max, p1_max] = pricing.pressure_thresholds;

    let tier = if pressure <= p0_max {
        PressureTier::P0
    } else if pressure <= p1_max {
        PressureTier::P1
    } else {
        PressureTier::P2
    };

    let trace = StageTrace {
        stage: StageKind::PressureTier,
        output: weights,
        degraded: false,
        detail: StageDetail::PressureTier {
            pressure,
            window_len: window.len(),
            tier,
        },
    };
    (tier, trace)
}
