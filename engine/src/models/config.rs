//! Closed algebraic campaign policy configuration
//!
//! Everything the draw pipeline consumes is a fixed-shape record or a tagged
//! variant; free-form nested objects are rejected at the serde boundary. The
//! single validation entry point is [`CampaignPolicy::validate`], called by
//! the policy store on install, so draw-time code only ever sees validated
//! configuration.
//!
//! # Fixed-point conventions
//!
//! - Tier weights are integers summing to `weight_scale` after each pipeline
//!   stage (e.g. 1_000_000).
//! - Multipliers are basis points of 10_000 (10_000 = identity).
//! - Rates (empty rate, award rate) are basis points of 10_000.

use crate::models::campaign::{Campaign, Prize, Tier, TierRule};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity multiplier in basis points.
pub const BPS_SCALE: u32 = 10_000;

/// Discretised budget posture, B0..B3.
///
/// B0 = most constrained (campaign has overspent the most); at B0 the
/// multiplier matrix forces every non-fallback weight to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetTier {
    B0,
    B1,
    B2,
    B3,
}

impl BudgetTier {
    pub fn index(self) -> usize {
        match self {
            BudgetTier::B0 => 0,
            BudgetTier::B1 => 1,
            BudgetTier::B2 => 2,
            BudgetTier::B3 => 3,
        }
    }
}

/// Discretised short-window award pressure, P0..P2.
///
/// P2 = highest pressure (the campaign is paying out the most relative to
/// what it takes in over the rolling window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PressureTier {
    P0,
    P1,
    P2,
}

impl PressureTier {
    pub fn index(self) -> usize {
        match self {
            PressureTier::P0 => 0,
            PressureTier::P1 => 1,
            PressureTier::P2 => 2,
        }
    }
}

/// One matrix cell: per-tier multipliers in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMultipliers {
    pub high: u32,
    pub mid: u32,
    pub low: u32,
    pub fallback: u32,
}

impl TierMultipliers {
    pub const IDENTITY: TierMultipliers = TierMultipliers {
        high: BPS_SCALE,
        mid: BPS_SCALE,
        low: BPS_SCALE,
        fallback: BPS_SCALE,
    };

    pub fn get(&self, tier: Tier) -> u32 {
        match tier {
            Tier::High => self.high,
            Tier::Mid => self.mid,
            Tier::Low => self.low,
            Tier::Fallback => self.fallback,
        }
    }
}

/// Complete 4×3 multiplier matrix indexed by (budget tier, pressure tier).
///
/// The closed representation is total: every cell exists, so draw-time
/// lookup cannot miss. Malformed documents (missing cells, unknown tier
/// labels) fail at deserialization or validation, never during a draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierMatrix {
    /// `cells[budget][pressure]`
    cells: [[TierMultipliers; 3]; 4],
}

impl TierMatrix {
    pub fn new(cells: [[TierMultipliers; 3]; 4]) -> Self {
        Self { cells }
    }

    /// Matrix with identity multipliers everywhere except the B0 row, whose
    /// non-fallback multipliers are zero.
    pub fn identity_with_b0_floor() -> Self {
        let b0 = TierMultipliers {
            high: 0,
            mid: 0,
            low: 0,
            fallback: BPS_SCALE,
        };
        Self {
            cells: [
                [b0; 3],
                [TierMultipliers::IDENTITY; 3],
                [TierMultipliers::IDENTITY; 3],
                [TierMultipliers::IDENTITY; 3],
            ],
        }
    }

    pub fn get(&self, budget: BudgetTier, pressure: PressureTier) -> &TierMultipliers {
        &self.cells[budget.index()][pressure.index()]
    }

    pub fn cell_mut(&mut self, budget: BudgetTier, pressure: PressureTier) -> &mut TierMultipliers {
        &mut self.cells[budget.index()][pressure.index()]
    }
}

/// Pricing and availability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Weight vectors are renormalised to this total after every stage
    pub weight_scale: u64,

    /// Budget-tier thresholds on campaign budget debt, strictly increasing.
    /// debt <= t[0] → B3, <= t[1] → B2, <= t[2] → B1, above t[2] → B0.
    pub budget_thresholds: [i64; 3],

    /// Pressure-tier thresholds on the rolling-window net outflow, strictly
    /// increasing. pressure <= t[0] → P0, <= t[1] → P1, above t[1] → P2.
    pub pressure_thresholds: [i64; 2],

    /// Rolling pressure window length in committed draws
    pub pressure_window_draws: usize,

    /// Planned average payout per draw; budget debt accrues the difference
    /// between actual payout and this plan on every committed draw.
    pub planned_payout_per_draw: i64,

    /// Planned award rate in basis points; inventory debt accrues the
    /// difference between actual awards and this plan (audit only).
    pub planned_award_rate_bps: u32,

    /// Ceiling on a single forced award's prize value when the anti-empty
    /// guard fires: a tier is eligible only if its cheapest available prize
    /// costs no more than `budget_soft_cap - budget_debt`. `None` disables
    /// the budget check for forced awards.
    pub budget_soft_cap: Option<i64>,

    pub matrix: TierMatrix,
}

/// One soft pity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftPity {
    /// Empty streak at which this level activates
    pub streak: u32,

    /// Multiplier applied to non-fallback weights (>= 10_000)
    pub multiplier_bps: u32,
}

/// Pity configuration: ordered soft thresholds plus the hard guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PityConfig {
    /// Soft thresholds, strictly increasing in `streak`, multipliers
    /// non-decreasing (pity never weakens as the streak grows).
    pub soft: Vec<SoftPity>,

    /// Streak at which the draw is forced non-empty (fallback weight zeroed)
    pub hard_streak: u32,
}

impl PityConfig {
    /// Highest soft threshold with `streak <= empty_streak`, if any.
    pub fn matching_soft(&self, empty_streak: u32) -> Option<&SoftPity> {
        self.soft.iter().rev().find(|p| p.streak <= empty_streak)
    }
}

/// Campaign-global luck-debt correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuckDebtConfig {
    /// Minimum cumulative draws before the historical empty rate is trusted
    pub sample_sufficient_threshold: u64,

    /// Expected empty rate in basis points
    pub expected_empty_rate_bps: u32,

    /// Boost gain: basis points of boost per basis point of deviation,
    /// scaled by 10_000 (e.g. 5_000 → half a bp of boost per bp of excess
    /// empty rate).
    pub boost_gain_bps: u32,

    /// Ceiling on the resulting non-fallback multiplier (>= 10_000)
    pub max_boost_bps: u32,

    /// Deviation banding for the audit trace (basis points)
    pub medium_deviation_bps: u32,
    pub high_deviation_bps: u32,
}

/// Per-user experience guards applied after prize selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakGuardConfig {
    /// Empty streak at which a fallback selection is overridden with a
    /// non-fallback tier when one is available
    pub force_nonempty_threshold: u32,

    /// Maximum consecutive high-tier awards before a high selection is
    /// downgraded to mid
    pub high_streak_cap: u32,
}

/// Errors detected while validating a campaign policy document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cost_per_draw must be positive, got {0}")]
    NonPositiveCost(i64),

    #[error("daily_quota must be positive")]
    ZeroDailyQuota,

    #[error("campaign window is empty: starts_at >= ends_at")]
    EmptyWindow,

    #[error("utc offset {0} out of range")]
    InvalidUtcOffset(i32),

    #[error("weight_scale must be positive")]
    ZeroWeightScale,

    #[error("missing tier rule for {0}")]
    MissingTierRule(&'static str),

    #[error("duplicate tier rule for {0}")]
    DuplicateTierRule(&'static str),

    #[error("fallback tier must not carry a daily cap")]
    FallbackDailyCap,

    #[error("tier {tier}: active prize weights sum to {actual}, rule says {expected}")]
    TierWeightMismatch {
        tier: &'static str,
        actual: u64,
        expected: u64,
    },

    #[error("fallback tier has no active prize")]
    FallbackUnreachable,

    #[error("fallback prize {0} has non-zero value")]
    FallbackPrizeHasValue(String),

    #[error("prize {0} belongs to campaign {1}, not this one")]
    ForeignPrize(String, String),

    #[error("duplicate prize id {0}")]
    DuplicatePrize(String),

    #[error("matrix cell (B{budget},P{pressure}) has zero fallback multiplier")]
    FallbackMultiplierZero { budget: usize, pressure: usize },

    #[error("matrix row B0 must zero all non-fallback multipliers")]
    B0RowNotClosed,

    #[error("budget thresholds must be strictly increasing")]
    BudgetThresholdsUnordered,

    #[error("pressure thresholds must be strictly increasing")]
    PressureThresholdsUnordered,

    #[error("pressure_window_draws must be positive")]
    ZeroPressureWindow,

    #[error("pity thresholds must be strictly increasing in streak")]
    PityStreaksUnordered,

    #[error("pity multipliers must be >= 10000 and non-decreasing")]
    PityMultipliersInvalid,

    #[error("hard pity streak must exceed every soft threshold")]
    HardPityTooLow,

    #[error("luck-debt max_boost_bps must be >= 10000")]
    LuckDebtCeilingInvalid,

    #[error("last_tiers_capacity must be positive")]
    ZeroRingCapacity,
}

/// The complete validated policy document for one campaign.
///
/// This is the read model the admin subsystem publishes; the engine treats
/// it as immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPolicy {
    pub campaign: Campaign,
    pub tier_rules: Vec<TierRule>,
    pub prizes: Vec<Prize>,
    pub pricing: PricingConfig,
    pub pity: PityConfig,
    pub luck_debt: LuckDebtConfig,
    pub guards: StreakGuardConfig,

    /// Capacity K of the per-user last-tiers ring buffer
    pub last_tiers_capacity: usize,
}

impl CampaignPolicy {
    /// Rule for a tier. Only call after validation.
    pub fn tier_rule(&self, tier: Tier) -> &TierRule {
        self.tier_rules
            .iter()
            .find(|r| r.tier == tier)
            .expect("validated policy has a rule per tier")
    }

    /// Active prizes in a tier.
    pub fn prizes_in_tier(&self, tier: Tier) -> impl Iterator<Item = &Prize> {
        self.prizes
            .iter()
            .filter(move |p| p.tier == tier && p.is_active())
    }

    /// Reject malformed configuration. Called once, at install time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.campaign;
        if c.cost_per_draw <= 0 {
            return Err(ConfigError::NonPositiveCost(c.cost_per_draw));
        }
        if c.daily_quota == 0 {
            return Err(ConfigError::ZeroDailyQuota);
        }
        if c.starts_at >= c.ends_at {
            return Err(ConfigError::EmptyWindow);
        }
        if c.utc_offset_secs.abs() >= 24 * 3600 {
            return Err(ConfigError::InvalidUtcOffset(c.utc_offset_secs));
        }
        if self.pricing.weight_scale == 0 {
            return Err(ConfigError::ZeroWeightScale);
        }
        if self.last_tiers_capacity == 0 {
            return Err(ConfigError::ZeroRingCapacity);
        }

        self.validate_tier_rules()?;
        self.validate_prizes()?;
        self.validate_matrix()?;
        self.validate_thresholds()?;
        self.validate_pity()?;

        if self.luck_debt.max_boost_bps < BPS_SCALE {
            return Err(ConfigError::LuckDebtCeilingInvalid);
        }
        Ok(())
    }

    fn validate_tier_rules(&self) -> Result<(), ConfigError> {
        for tier in Tier::ALL {
            let count = self.tier_rules.iter().filter(|r| r.tier == tier).count();
            if count == 0 {
                return Err(ConfigError::MissingTierRule(tier.label()));
            }
            if count > 1 {
                return Err(ConfigError::DuplicateTierRule(tier.label()));
            }
        }
        let fallback = self.tier_rule(Tier::Fallback);
        if fallback.daily_cap_per_user.is_some() {
            return Err(ConfigError::FallbackDailyCap);
        }
        Ok(())
    }

    fn validate_prizes(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for prize in &self.prizes {
            if prize.campaign_id != self.campaign.id {
                return Err(ConfigError::ForeignPrize(
                    prize.id.clone(),
                    prize.campaign_id.clone(),
                ));
            }
            if !seen.insert(prize.id.as_str()) {
                return Err(ConfigError::DuplicatePrize(prize.id.clone()));
            }
            if prize.tier == Tier::Fallback && prize.is_active() && prize.value != 0 {
                return Err(ConfigError::FallbackPrizeHasValue(prize.id.clone()));
            }
        }
        for tier in Tier::ALL {
            let rule = self.tier_rule(tier);
            let actual: u64 = self.prizes_in_tier(tier).map(|p| p.base_weight).sum();
            if actual != rule.base_weight {
                return Err(ConfigError::TierWeightMismatch {
                    tier: tier.label(),
                    actual,
                    expected: rule.base_weight,
                });
            }
        }
        if self.prizes_in_tier(Tier::Fallback).next().is_none() {
            return Err(ConfigError::FallbackUnreachable);
        }
        Ok(())
    }

    fn validate_matrix(&self) -> Result<(), ConfigError> {
        for (bi, budget) in [BudgetTier::B0, BudgetTier::B1, BudgetTier::B2, BudgetTier::B3]
            .into_iter()
            .enumerate()
        {
            for (pi, pressure) in [PressureTier::P0, PressureTier::P1, PressureTier::P2]
                .into_iter()
                .enumerate()
            {
                let cell = self.pricing.matrix.get(budget, pressure);
                if cell.fallback == 0 {
                    return Err(ConfigError::FallbackMultiplierZero {
                        budget: bi,
                        pressure: pi,
                    });
                }
                if budget == BudgetTier::B0 && (cell.high != 0 || cell.mid != 0 || cell.low != 0) {
                    return Err(ConfigError::B0RowNotClosed);
                }
            }
        }
        Ok(())
    }

    fn validate_thresholds(&self) -> Result<(), ConfigError> {
        let b = &self.pricing.budget_thresholds;
        if !(b[0] < b[1] && b[1] < b[2]) {
            return Err(ConfigError::BudgetThresholdsUnordered);
        }
        let p = &self.pricing.pressure_thresholds;
        if p[0] >= p[1] {
            return Err(ConfigError::PressureThresholdsUnordered);
        }
        if self.pricing.pressure_window_draws == 0 {
            return Err(ConfigError::ZeroPressureWindow);
        }
        Ok(())
    }

    fn validate_pity(&self) -> Result<(), ConfigError> {
        let soft = &self.pity.soft;
        let mut last_streak = None;
        let mut last_mult = BPS_SCALE;
        for level in soft {
            if let Some(prev) = last_streak {
                if level.streak <= prev {
                    return Err(ConfigError::PityStreaksUnordered);
                }
            }
            if level.multiplier_bps < last_mult {
                return Err(ConfigError::PityMultipliersInvalid);
            }
            last_streak = Some(level.streak);
            last_mult = level.multiplier_bps;
        }
        if let Some(last) = soft.last() {
            if self.pity.hard_streak <= last.streak {
                return Err(ConfigError::HardPityTooLow);
            }
        }
        Ok(())
    }
}
