//! Asset balances and the append-only transaction log
//!
//! [`AssetBalance`] is the single source of truth for spendable amounts;
//! [`AssetTransaction`] is the append-only log from which balances are
//! derivable. The (business_type, business_key) pair is unique; the ledger
//! enforces it as the idempotency source of truth.
//!
//! CRITICAL: All money values are i64 (smallest currency unit)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Balance of one (account, asset) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Spendable now
    pub available: i64,

    /// Held for in-flight draws
    pub reserved: i64,
}

impl AssetBalance {
    pub fn total(&self) -> i64 {
        self.available + self.reserved
    }
}

/// Business classification of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    /// Cost asset spent on a committed draw
    DrawCost,

    /// Reward asset credited for an awarded prize
    DrawReward,

    /// Cost asset granted by the consumption subsystem
    TopUp,
}

impl BusinessType {
    pub fn label(self) -> &'static str {
        match self {
            BusinessType::DrawCost => "draw_cost",
            BusinessType::DrawReward => "draw_reward",
            BusinessType::TopUp => "top_up",
        }
    }
}

/// One append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransaction {
    pub id: String,
    pub user_id: String,
    pub asset_code: String,

    /// Signed movement of `available`
    pub delta: i64,

    pub business_type: BusinessType,

    /// Caller-supplied key; unique together with `business_type`
    pub business_key: String,

    pub created_at: DateTime<Utc>,
}
