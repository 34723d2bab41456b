//! Campaign and prize catalogue models
//!
//! A campaign is the unit of lottery configuration: it names the cost asset,
//! the price of a draw, the daily quota, and the time window in which draws
//! are accepted. Prizes belong to exactly one campaign and one tier.
//!
//! CRITICAL: All money values are i64 (smallest currency unit)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse prize class.
///
/// `Fallback` is the empty/no-award class: drawing it produces an `Empty`
/// outcome and credits nothing, but may still hand out a zero-value token
/// prize for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Mid,
    Low,
    Fallback,
}

impl Tier {
    /// All tiers in sampling order.
    pub const ALL: [Tier; 4] = [Tier::High, Tier::Mid, Tier::Low, Tier::Fallback];

    pub fn is_fallback(self) -> bool {
        matches!(self, Tier::Fallback)
    }

    /// Dense index for per-tier counters.
    pub fn index(self) -> usize {
        match self {
            Tier::High => 0,
            Tier::Mid => 1,
            Tier::Low => 2,
            Tier::Fallback => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Mid => "mid",
            Tier::Low => "low",
            Tier::Fallback => "fallback",
        }
    }
}

/// Campaign lifecycle status.
///
/// The engine only ever reads these; authoring transitions happen in the
/// admin subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

/// A lottery campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign identifier
    pub id: String,

    pub status: CampaignStatus,

    /// Asset charged per draw (e.g. "POINTS")
    pub cost_asset_code: String,

    /// Asset credited for awarded prizes (e.g. "COUPON_VALUE")
    pub reward_asset_code: String,

    /// Price of a single draw (smallest unit, > 0)
    pub cost_per_draw: i64,

    /// Maximum draws per user per local calendar day
    pub daily_quota: u32,

    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,

    /// Timezone for the daily reset, as a fixed UTC offset in seconds
    pub utc_offset_secs: i32,
}

impl Campaign {
    /// Whether draws are accepted at `now`: active status and inside the
    /// time window (start inclusive, end exclusive).
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Active && self.starts_at <= now && now < self.ends_at
    }
}

/// Prize inventory level.
///
/// Fallback-tier token prizes are usually `Unlimited`; physical prizes carry
/// a finite count that is decremented atomically on award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stock {
    Unlimited,
    Finite(u32),
}

impl Stock {
    /// Remaining units above a hard floor. `Unlimited` is always above.
    pub fn above_floor(self, floor: u32) -> bool {
        match self {
            Stock::Unlimited => true,
            Stock::Finite(n) => n > floor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeStatus {
    Active,
    Disabled,
}

/// A prize in a campaign's catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    pub id: String,
    pub campaign_id: String,
    pub tier: Tier,

    /// Weight within the tier; the per-tier weights of active prizes sum to
    /// the tier rule's base weight.
    pub base_weight: u64,

    /// Reward value credited on award (smallest unit; 0 for fallback tokens)
    pub value: i64,

    pub initial_stock: Stock,
    pub status: PrizeStatus,
}

impl Prize {
    pub fn is_active(&self) -> bool {
        self.status == PrizeStatus::Active
    }
}

/// Static per-tier rules for a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierRule {
    pub tier: Tier,

    /// Base sampling weight of the whole tier
    pub base_weight: u64,

    /// Per-user cap on awards from this tier per local day.
    /// Must be `None` for the fallback tier (fallback stays reachable).
    pub daily_cap_per_user: Option<u32>,

    /// Stock level at or below which prizes in this tier stop being awarded
    pub hard_stock_floor: u32,
}
