//! Draw results, records and the decision snapshot
//!
//! A committed draw is stored once as a [`DrawRecord`]; replays rebuild the
//! caller-visible [`DrawResult`] from the record. The [`DecisionSnapshot`]
//! inside the record is the authoritative audit trail: inputs, every stage's
//! output, every post-sampling correction, the RNG seed and the chosen
//! prize.

use crate::models::campaign::Tier;
use crate::policy::{GuardTrace, PityKind, StageDetail, StageTrace, WeightVector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal classification of a committed draw.
///
/// Rejections (quota, funds, configuration…) are the error arm of
/// `DrawOrchestrator::execute` and never produce a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawOutcome {
    /// A non-fallback prize was awarded and its value credited
    Awarded,

    /// The draw terminated in the fallback (empty) class
    Empty,
}

/// Prize identity as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeDescriptor {
    pub id: String,
    pub tier: Tier,
    pub value: i64,
}

/// Post-draw balance of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub asset_code: String,
    pub available: i64,
    pub reserved: i64,
}

/// Caller-visible result of one draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub outcome: DrawOutcome,

    /// Awarded prize, or the fallback token handed out with an empty outcome
    pub prize: Option<PrizeDescriptor>,

    /// Cost asset charged for this draw
    pub cost_charged: i64,

    /// Post-commit balances of the cost and reward assets
    pub balances: Vec<BalanceSnapshot>,

    /// Draw record id
    pub decision_id: String,

    /// True when this result was served from the stored record
    pub replayed: bool,
}

/// State inputs the pipeline ran against, captured for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInputs {
    pub empty_streak: u32,
    pub high_streak: u32,
    pub total_draws_today: u32,
    pub budget_debt: i64,
    pub pressure: i64,
    pub cumulative_draws: u64,
    pub cumulative_empties: u64,
}

/// The ordered record of one decision: inputs, intermediates, outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    /// Policy snapshot version the draw was decided under
    pub policy_version: u64,

    /// Per-draw RNG seed; replaying with it reproduces the selection
    pub rng_seed: u64,

    pub inputs: SnapshotInputs,

    pub base_weights: WeightVector,

    /// Tier-resolution stages in execution order
    pub stages: Vec<StageTrace>,

    pub final_weights: WeightVector,

    /// Tier the selector sampled before any guard ran
    pub sampled_tier: Tier,

    /// Post-sampling corrections in application order
    pub guards: Vec<GuardTrace>,

    /// Tier the draw actually terminated in
    pub final_tier: Tier,

    pub prize_id: Option<String>,
}

impl DecisionSnapshot {
    /// Pity classification recorded by the pity stage, for audit queries.
    pub fn pity_kind(&self) -> PityKind {
        self.stages
            .iter()
            .find_map(|s| match s.detail {
                StageDetail::Pity { kind, .. } => Some(kind),
                _ => None,
            })
            .unwrap_or(PityKind::None)
    }
}

/// One committed draw, written exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub id: String,
    pub user_id: String,
    pub campaign_id: String,
    pub idempotency_key: String,

    pub outcome: DrawOutcome,
    pub tier: Tier,
    pub prize_id: Option<String>,
    pub prize_value: i64,

    pub cost_asset_code: String,
    pub cost_amount: i64,

    /// Balances at commit time, kept so replays return the original result
    pub balances: Vec<BalanceSnapshot>,

    pub snapshot: DecisionSnapshot,
    pub created_at: DateTime<Utc>,
}

impl DrawRecord {
    /// Rebuild the caller-visible result from the stored record.
    pub fn to_result(&self, replayed: bool) -> DrawResult {
        let prize = self.prize_id.as_ref().map(|id| PrizeDescriptor {
            id: id.clone(),
            tier: self.tier,
            value: self.prize_value,
        });
        DrawResult {
            outcome: self.outcome,
            prize,
            cost_charged: self.cost_amount,
            balances: self.balances.clone(),
            decision_id: self.id.clone(),
            replayed,
        }
    }
}
