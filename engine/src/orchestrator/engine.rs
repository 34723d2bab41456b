//! Draw Orchestrator
//!
//! Executes one draw end to end:
//!
//! ```text
//! 1. Idempotency lookup (stored record wins, replayed=true)
//! 2. Policy load + campaign gates
//! 3. Quota check (daily reset applied first)
//! 4. Cost reservation
//! 5. Tier resolution (pure five-stage fold)
//! 6. Prize selection + post-sampling guards
//! 7. Commit under the per-(user, campaign) lock:
//!    re-check idempotency and quota, consume stock (one-shot fallback
//!    re-selection on a race), settle cost, credit reward, fold state
//!    deltas, write the draw record with its decision snapshot
//! 8. Any failure between reservation and commit releases the reservation
//! ```
//!
//! State machine per draw: Received → PolicyLoaded → QuotaChecked →
//! CostReserved → TierResolved → PrizeSelected → Committed, with Rejected
//! and Failed as the non-terminal-writing exits. Rejections write no record
//! and leave no reservation behind; a crash after commit is resolved on
//! retry by the idempotency lookup.
//!
//! # Critical Invariants
//!
//! - Exactly one draw record and one cost transaction per idempotency key
//! - Balance changes happen only through the ledger's four operations
//! - Stock never goes negative; a depletion race ends in fallback or empty
//! - Every committed draw carries its full ordered decision trace

use crate::core::{local_date, Clock};
use crate::ledger::{LedgerError, LedgerService};
use crate::models::campaign::{Prize, Tier};
use crate::models::config::CampaignPolicy;
use crate::models::draw::{
    BalanceSnapshot, DecisionSnapshot, DrawOutcome, DrawRecord, DrawResult, SnapshotInputs,
};
use crate::models::state::UserCampaignState;
use crate::orchestrator::locks::DrawLockRegistry;
use crate::orchestrator::{DrawError, NullSink, TraceSink, MAX_IDEMPOTENCY_KEY_LEN};
use crate::policy::{
    guard_empty_streak, guard_high_streak, resolve_weights, GuardTrace, WeightResolution,
};
use crate::rng::{DrawRng, SeedSource};
use crate::selector::{sample_prize, sample_tier, AvailabilitySet};
use crate::store::{PolicySnapshot, PolicyStore, StateStore};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for acquiring the per-(user, campaign) lock
    pub lock_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
        }
    }
}

/// The draw engine's single entry point.
///
/// All collaborators are explicit dependencies, which keeps tests parallel
/// and replays deterministic: swap the clock and the seed source and the
/// engine becomes a pure function of its stores.
pub struct DrawOrchestrator {
    policy_store: Arc<PolicyStore>,
    ledger: Arc<LedgerService>,
    state: Arc<StateStore>,
    clock: Arc<dyn Clock>,
    seeds: Arc<dyn SeedSource>,
    sink: Arc<dyn TraceSink>,
    locks: DrawLockRegistry,
    config: OrchestratorConfig,
}

impl DrawOrchestrator {
    pub fn new(
        policy_store: Arc<PolicyStore>,
        ledger: Arc<LedgerService>,
        state: Arc<StateStore>,
        clock: Arc<dyn Clock>,
        seeds: Arc<dyn SeedSource>,
    ) -> Self {
        Self {
            policy_store,
            ledger,
            state,
            clock,
            seeds,
            sink: Arc::new(NullSink),
            locks: DrawLockRegistry::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute one draw attempt.
    ///
    /// Retrying with the same idempotency key is always safe: a committed
    /// draw is returned as stored with `replayed = true`, an uncommitted
    /// one is re-executed after its reservation was released.
    pub fn execute(
        &self,
        user_id: &str,
        campaign_id: &str,
        idempotency_key: &str,
    ) -> Result<DrawResult, DrawError> {
        if idempotency_key.is_empty() || idempotency_key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(DrawError::InternalFailure {
                reason: format!(
                    "idempotency key must be 1..={MAX_IDEMPOTENCY_KEY_LEN} characters"
                ),
            });
        }

        // Step 1: a committed draw wins outright.
        if let Some(record) = self.state.find_draw(user_id, idempotency_key) {
            debug!(user = user_id, key = idempotency_key, "replaying stored draw");
            return Ok(record.to_result(true));
        }

        // Step 2: policy load and campaign gates.
        let snapshot = self.policy_store.load(campaign_id).ok_or_else(|| {
            DrawError::CampaignUnavailable {
                reason: format!("campaign {campaign_id} is not published"),
            }
        })?;
        let policy = &snapshot.policy;
        // The store validates on install, but a snapshot can also reach the
        // cache through the unchecked republish path; a draw never runs
        // against a document that fails the invariants.
        if let Err(err) = policy.validate() {
            warn!(campaign = campaign_id, error = %err, "rejecting draw on invalid policy snapshot");
            return Err(DrawError::ConfigurationInvalid {
                reason: err.to_string(),
            });
        }
        let now = self.clock.now_utc();
        self.check_campaign_open(policy, now)?;
        self.state.seed_inventory(&policy.prizes);

        // Step 3: quota, on state rolled to the campaign-local date.
        let today = local_date(now, policy.campaign.utc_offset_secs);
        let user = self
            .state
            .user_state(user_id, campaign_id, today, policy.last_tiers_capacity);
        self.check_quota(policy, &user)?;

        // Step 4: reserve the cost; everything past this point must release
        // the reservation on failure.
        let cost_key = format!("{idempotency_key}::cost");
        self.ledger
            .reserve(
                user_id,
                &policy.campaign.cost_asset_code,
                policy.campaign.cost_per_draw,
                &cost_key,
            )
            .map_err(map_ledger_error)?;

        match self.decide_and_commit(&snapshot, user, user_id, campaign_id, idempotency_key, &cost_key, today) {
            Ok(result) => Ok(result),
            Err(err) => {
                // Releasing a committed reservation is a no-op, so this is
                // safe even when the failure raced a concurrent commit of
                // the same key.
                if let Err(release_err) = self.ledger.release(&cost_key) {
                    warn!(key = %cost_key, error = %release_err, "reservation release failed");
                }
                warn!(user = user_id, key = idempotency_key, code = err.code(), "draw rejected");
                Err(err)
            }
        }
    }

    /// Sequential multi-draw (e.g. a ten-pull), with per-draw idempotency
    /// keys derived as `{base_key}::{index}`. Stops at the first error; the
    /// caller inspects the last element to decide whether to continue.
    pub fn execute_many(
        &self,
        user_id: &str,
        campaign_id: &str,
        base_key: &str,
        count: u32,
    ) -> Vec<Result<DrawResult, DrawError>> {
        let mut results = Vec::with_capacity(count as usize);
        for i in 0..count {
            let key = format!("{base_key}::{i}");
            let result = self.execute(user_id, campaign_id, &key);
            let failed = result.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    // ------------------------------------------------------------------
    // Steps 5-7
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn decide_and_commit(
        &self,
        snapshot: &PolicySnapshot,
        user_pre: UserCampaignState,
        user_id: &str,
        campaign_id: &str,
        idempotency_key: &str,
        cost_key: &str,
        today: NaiveDate,
    ) -> Result<DrawResult, DrawError> {
        let policy = &snapshot.policy;

        // Step 5: pure tier resolution against pre-draw state.
        let global_pre = self
            .state
            .global_state(campaign_id, policy.pricing.pressure_window_draws);
        let resolution = resolve_weights(policy, &user_pre, &global_pre);

        // Step 6: sampling and guards.
        let seed = self.seeds.next_seed();
        let mut rng = DrawRng::new(seed);
        let avail = AvailabilitySet::build(policy, &user_pre, |id| self.state.remaining_stock(id));
        if !avail.has_any(Tier::Fallback) {
            return Err(DrawError::StockExhausted);
        }

        let sampled = sample_tier(&mut rng, &resolution.final_weights).unwrap_or(Tier::Fallback);
        let mut guards: Vec<GuardTrace> = Vec::new();

        let (tier, trace) = guard_empty_streak(
            sampled,
            policy,
            &user_pre,
            &global_pre,
            &avail,
            &resolution.final_weights,
        );
        guards.extend(trace);
        let (tier, trace) = guard_high_streak(tier, policy, &user_pre);
        guards.extend(trace);

        let mut final_tier = tier;
        if !avail.has_any(final_tier) {
            guards.push(GuardTrace::SelectorRedirect { from: final_tier });
            final_tier = Tier::Fallback;
        }
        let mut prize: Option<&Prize> = sample_prize(&mut rng, avail.available(final_tier));

        // Step 7: commit under the per-(user, campaign) lock.
        let _lock = self
            .locks
            .acquire(user_id, campaign_id, self.config.lock_timeout)
            .ok_or(DrawError::LockTimeout {
                timeout_ms: self.config.lock_timeout.as_millis() as u64,
            })?;

        // Double-checked idempotency: a concurrent submit with the same key
        // may have committed while we were selecting.
        if let Some(existing) = self.state.find_draw(user_id, idempotency_key) {
            return Ok(existing.to_result(true));
        }

        // Re-verify quota against fresh state; earlier commits by this user
        // may have consumed it since step 3.
        let mut user = self
            .state
            .user_state(user_id, campaign_id, today, policy.last_tiers_capacity);
        self.check_quota(policy, &user)?;

        // Consume stock; a depletion race falls back once to the fallback
        // tier, and an empty outcome without a token prize if even that is
        // gone.
        if !self.try_claim(policy, &user, final_tier, prize) {
            guards.push(GuardTrace::StockRace { from: final_tier });
            final_tier = Tier::Fallback;
            let floor = policy.tier_rule(Tier::Fallback).hard_stock_floor;
            let candidates: Vec<&Prize> = policy
                .prizes_in_tier(Tier::Fallback)
                .filter(|p| {
                    self.state
                        .remaining_stock(&p.id)
                        .map(|s| s.above_floor(floor))
                        .unwrap_or(false)
                })
                .collect();
            prize = sample_prize(&mut rng, &candidates)
                .filter(|p| self.state.try_consume_stock(&p.id, floor));
        }

        let outcome = if final_tier.is_fallback() {
            DrawOutcome::Empty
        } else {
            DrawOutcome::Awarded
        };
        let prize_value = prize.map(|p| p.value).unwrap_or(0);

        // Settle money: cost first, then the reward credit.
        self.ledger.commit(cost_key).map_err(map_ledger_error)?;
        if outcome == DrawOutcome::Awarded && prize_value > 0 {
            let reward_key = format!("{idempotency_key}::reward");
            self.ledger
                .credit(
                    user_id,
                    &policy.campaign.reward_asset_code,
                    prize_value,
                    crate::models::asset::BusinessType::DrawReward,
                    &reward_key,
                )
                .map_err(map_ledger_error)?;
        }

        // Fold the deltas into per-user and campaign-global state.
        user.apply_draw(final_tier);
        self.state.put_user_state(user);

        let mut global = self
            .state
            .global_state(campaign_id, policy.pricing.pressure_window_draws);
        global.apply_draw(
            policy.campaign.cost_per_draw,
            if outcome == DrawOutcome::Awarded { prize_value } else { 0 },
            outcome == DrawOutcome::Awarded,
            policy.pricing.planned_payout_per_draw,
            policy.pricing.planned_award_rate_bps,
        );
        self.state.put_global_state(global);

        // Write the record with its full decision snapshot.
        let balances = vec![
            self.balance_snapshot(user_id, &policy.campaign.cost_asset_code),
            self.balance_snapshot(user_id, &policy.campaign.reward_asset_code),
        ];
        let decision = build_snapshot(
            snapshot.version,
            seed,
            &user_pre,
            &global_pre,
            &resolution,
            sampled,
            guards,
            final_tier,
            prize.map(|p| p.id.clone()),
        );
        let record = DrawRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            campaign_id: campaign_id.to_string(),
            idempotency_key: idempotency_key.to_string(),
            outcome,
            tier: final_tier,
            prize_id: prize.map(|p| p.id.clone()),
            prize_value,
            cost_asset_code: policy.campaign.cost_asset_code.clone(),
            cost_amount: policy.campaign.cost_per_draw,
            balances,
            snapshot: decision,
            created_at: self.clock.now_utc(),
        };

        if let Err(existing) = self.state.insert_draw(record.clone()) {
            // The unique index is authoritative; under the lock this means
            // a replay slipped in, so serve the stored record.
            return Ok(existing.to_result(true));
        }

        self.sink.emit(&record);
        info!(
            user = user_id,
            campaign = campaign_id,
            draw_id = %record.id,
            outcome = ?record.outcome,
            tier = record.tier.label(),
            "draw committed"
        );
        Ok(record.to_result(false))
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn check_campaign_open(
        &self,
        policy: &CampaignPolicy,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), DrawError> {
        use crate::models::campaign::CampaignStatus;
        let campaign = &policy.campaign;
        let reason = match campaign.status {
            CampaignStatus::Draft => Some("campaign is not yet published"),
            CampaignStatus::Paused => Some("campaign is paused"),
            CampaignStatus::Ended => Some("campaign has ended"),
            CampaignStatus::Active if now < campaign.starts_at => {
                Some("campaign has not started")
            }
            CampaignStatus::Active if now >= campaign.ends_at => {
                Some("campaign window is over")
            }
            CampaignStatus::Active => None,
        };
        match reason {
            Some(reason) => Err(DrawError::CampaignUnavailable {
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn check_quota(
        &self,
        policy: &CampaignPolicy,
        user: &UserCampaignState,
    ) -> Result<(), DrawError> {
        let quota = policy.campaign.daily_quota;
        if user.total_draws_today >= quota {
            return Err(DrawError::QuotaExceeded {
                quota,
                remaining: quota.saturating_sub(user.total_draws_today),
            });
        }
        Ok(())
    }

    /// Tier-cap re-check plus atomic stock consumption for the selected
    /// prize. Returns false on any miss, which the caller treats as a race.
    fn try_claim(
        &self,
        policy: &CampaignPolicy,
        user: &UserCampaignState,
        tier: Tier,
        prize: Option<&Prize>,
    ) -> bool {
        let rule = policy.tier_rule(tier);
        if let Some(cap) = rule.daily_cap_per_user {
            if user.awards_today(tier) >= cap {
                return false;
            }
        }
        match prize {
            Some(p) => self.state.try_consume_stock(&p.id, rule.hard_stock_floor),
            None => false,
        }
    }

    fn balance_snapshot(&self, user_id: &str, asset_code: &str) -> BalanceSnapshot {
        let balance = self.ledger.balance(user_id, asset_code);
        BalanceSnapshot {
            asset_code: asset_code.to_string(),
            available: balance.available,
            reserved: balance.reserved,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_snapshot(
    policy_version: u64,
    rng_seed: u64,
    user_pre: &UserCampaignState,
    global_pre: &crate::models::state::CampaignGlobalState,
    resolution: &WeightResolution,
    sampled_tier: Tier,
    guards: Vec<GuardTrace>,
    final_tier: Tier,
    prize_id: Option<String>,
) -> DecisionSnapshot {
    DecisionSnapshot {
        policy_version,
        rng_seed,
        inputs: SnapshotInputs {
            empty_streak: user_pre.empty_streak,
            high_streak: user_pre.high_streak,
            total_draws_today: user_pre.total_draws_today,
            budget_debt: global_pre.budget_debt,
            pressure: global_pre.window.pressure(),
            cumulative_draws: global_pre.cumulative_draws,
            cumulative_empties: global_pre.cumulative_empties,
        },
        base_weights: resolution.base,
        stages: resolution.stages.clone(),
        final_weights: resolution.final_weights,
        sampled_tier,
        guards,
        final_tier,
        prize_id,
    }
}

fn map_ledger_error(err: LedgerError) -> DrawError {
    match err {
        LedgerError::InsufficientFunds {
            asset_code,
            required,
            available,
        } => DrawError::InsufficientFunds {
            asset_code,
            required,
            available,
        },
        other => DrawError::InternalFailure {
            reason: other.to_string(),
        },
    }
}
