//! Per-user and campaign-global experience state
//!
//! [`UserCampaignState`] shapes an individual user's draw experience (pity,
//! streak guards, quotas). [`CampaignGlobalState`] carries the campaign-wide
//! aggregates the budget and pressure resolvers read. Both are mutated only
//! inside the orchestrator's commit step, under the per-(user, campaign)
//! lock.

use crate::models::campaign::Tier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded ring of the most recent draw tiers for one user.
///
/// Fixed capacity K; pushing the (K+1)-th element evicts the oldest. Replaces
/// the unbounded JSON array the legacy system kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRing {
    capacity: usize,
    items: VecDeque<Tier>,
}

impl TierRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, tier: Tier) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(tier);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = Tier> + '_ {
        self.items.iter().copied()
    }

    pub fn latest(&self) -> Option<Tier> {
        self.items.back().copied()
    }
}

/// Per-(user, campaign) experience state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCampaignState {
    pub user_id: String,
    pub campaign_id: String,

    /// Consecutive empty (fallback) outcomes
    pub empty_streak: u32,

    /// Consecutive high-tier awards
    pub high_streak: u32,

    /// Draws committed today (local campaign date)
    pub total_draws_today: u32,

    /// Awards committed today, indexed by `Tier::index()`
    pub tier_awards_today: [u32; 4],

    /// Local date the daily counters were last reset for
    pub last_reset_date: NaiveDate,

    /// Tiers of the last K draws, oldest first
    pub last_tiers: TierRing,
}

impl UserCampaignState {
    pub fn new(user_id: &str, campaign_id: &str, today: NaiveDate, ring_capacity: usize) -> Self {
        Self {
            user_id: user_id.to_string(),
            campaign_id: campaign_id.to_string(),
            empty_streak: 0,
            high_streak: 0,
            total_draws_today: 0,
            tier_awards_today: [0; 4],
            last_reset_date: today,
            last_tiers: TierRing::new(ring_capacity),
        }
    }

    /// Reset daily counters if `today` is a later local date than the last
    /// reset. Idempotent: calling twice with the same date changes nothing,
    /// and an earlier date (clock skew) is ignored.
    pub fn roll_to(&mut self, today: NaiveDate) {
        if today > self.last_reset_date {
            self.total_draws_today = 0;
            self.tier_awards_today = [0; 4];
            self.last_reset_date = today;
        }
    }

    /// Awards committed today from one tier.
    pub fn awards_today(&self, tier: Tier) -> u32 {
        self.tier_awards_today[tier.index()]
    }

    /// Fold one committed draw into the state: streaks, daily counters and
    /// the tier ring.
    pub fn apply_draw(&mut self, tier: Tier) {
        self.total_draws_today += 1;
        self.tier_awards_today[tier.index()] += 1;
        self.last_tiers.push(tier);

        if tier.is_fallback() {
            self.empty_streak += 1;
            self.high_streak = 0;
        } else {
            self.empty_streak = 0;
            if tier == Tier::High {
                self.high_streak += 1;
            } else {
                self.high_streak = 0;
            }
        }
    }
}

/// One committed draw's contribution to the pressure window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureSample {
    /// Cost asset charged
    pub cost: i64,
    /// Reward value paid out (0 for empty draws)
    pub payout: i64,
}

/// Bounded rolling window over recent draws, feeding the pressure resolver.
///
/// Pressure = recent cost inflow minus recent reward outflow, negated so
/// that a positive value means the campaign is paying out more than it takes
/// in (high pressure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureWindow {
    capacity: usize,
    samples: VecDeque<PressureSample>,
}

impl PressureWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: PressureSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Net outflow over the window: payouts minus costs.
    pub fn pressure(&self) -> i64 {
        self.samples
            .iter()
            .map(|s| s.payout - s.cost)
            .sum()
    }
}

/// Campaign-wide aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignGlobalState {
    pub campaign_id: String,

    pub cumulative_draws: u64,
    pub cumulative_empties: u64,

    /// Signed; positive = paid out above plan
    pub budget_debt: i64,

    /// Signed award-rate drift versus plan, in bps-draws (audit only)
    pub inventory_debt: i64,

    /// Rolling window feeding the pressure resolver
    pub window: PressureWindow,
}

impl CampaignGlobalState {
    pub fn new(campaign_id: &str, window_capacity: usize) -> Self {
        Self {
            campaign_id: campaign_id.to_string(),
            cumulative_draws: 0,
            cumulative_empties: 0,
            budget_debt: 0,
            inventory_debt: 0,
            window: PressureWindow::new(window_capacity),
        }
    }

    /// Historical empty rate in basis points; `None` before the first draw.
    pub fn empty_rate_bps(&self) -> Option<u32> {
        if self.cumulative_draws == 0 {
            None
        } else {
            Some((self.cumulative_empties * 10_000 / self.cumulative_draws) as u32)
        }
    }

    /// Fold one committed draw into the aggregates.
    ///
    /// `payout` is the prize value credited (0 for empty outcomes);
    /// `planned_payout` and `planned_award_rate_bps` come from the pricing
    /// config.
    pub fn apply_draw(
        &mut self,
        cost: i64,
        payout: i64,
        awarded: bool,
        planned_payout: i64,
        planned_award_rate_bps: u32,
    ) {
        self.cumulative_draws += 1;
        if !awarded {
            self.cumulative_empties += 1;
        }
        self.budget_debt += payout - planned_payout;
        let award_bps: i64 = if awarded { 10_000 } else { 0 };
        self.inventory_debt += award_bps - planned_award_rate_bps as i64;
        self.window.push(PressureSample { cost, payout });
    }
}
