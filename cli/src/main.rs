//! Loyalty lottery demo driver
//!
//! Runs a batch of draws against an in-memory engine and prints per-draw
//! outcomes plus summary statistics. Useful for eyeballing a campaign
//! policy before publishing it: same seed, same policy → same printout.

use chrono::{TimeZone, Utc};
use clap::Parser;
use loyalty_lottery_core_rs::models::asset::BusinessType;
use loyalty_lottery_core_rs::models::campaign::{
    Campaign, CampaignStatus, Prize, PrizeStatus, Stock, Tier, TierRule,
};
use loyalty_lottery_core_rs::models::config::{
    CampaignPolicy, LuckDebtConfig, PityConfig, PricingConfig, SoftPity, StreakGuardConfig,
    TierMatrix,
};
use loyalty_lottery_core_rs::models::draw::DrawOutcome;
use loyalty_lottery_core_rs::{
    DrawError, DrawOrchestrator, FixedClock, LedgerService, PolicyStore, SequenceSeedSource,
    StateStore, TracingSink,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "loyalty-lottery", about = "Run a deterministic batch of lottery draws")]
struct Args {
    /// Campaign policy JSON; omit to use the built-in demo campaign
    #[arg(long)]
    policy: Option<PathBuf>,

    /// User to draw for
    #[arg(long, default_value = "demo-user")]
    user: String,

    /// Number of draws to attempt
    #[arg(long, default_value_t = 20)]
    draws: u32,

    /// Base seed for the deterministic per-draw seed sequence
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Opening cost-asset balance
    #[arg(long, default_value_t = 10_000)]
    balance: i64,

    /// Log decision traces
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let policy = match &args.policy {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<CampaignPolicy>(&raw)?
        }
        None => demo_policy(),
    };
    let campaign_id = policy.campaign.id.clone();
    let cost_asset = policy.campaign.cost_asset_code.clone();
    let reward_asset = policy.campaign.reward_asset_code.clone();
    let cost_per_draw = policy.campaign.cost_per_draw;

    // Clock pinned just after the campaign opens, so runs are reproducible.
    let clock = Arc::new(FixedClock::new(
        policy.campaign.starts_at + chrono::Duration::hours(12),
    ));
    let policy_store = Arc::new(PolicyStore::new());
    policy_store.install(policy)?;
    let ledger = Arc::new(LedgerService::new(clock.clone()));
    let state = Arc::new(StateStore::new());
    let orchestrator = DrawOrchestrator::new(
        policy_store,
        ledger.clone(),
        state.clone(),
        clock.clone(),
        Arc::new(SequenceSeedSource::new(args.seed)),
    )
    .with_sink(Arc::new(TracingSink));

    ledger.credit(
        &args.user,
        &cost_asset,
        args.balance,
        BusinessType::TopUp,
        "cli::opening-balance",
    )?;

    println!(
        "campaign {campaign_id}: {} draws for {} (cost {cost_per_draw} {cost_asset}/draw, opening {})",
        args.draws, args.user, args.balance
    );

    let mut per_tier = [0u32; 4];
    let mut committed = 0u32;
    let mut i = 0;
    while i < args.draws {
        let key = format!("cli::{}::{i}", args.seed);
        match orchestrator.execute(&args.user, &campaign_id, &key) {
            Ok(result) => {
                committed += 1;
                let prize = result
                    .prize
                    .as_ref()
                    .map(|p| p.id.as_str())
                    .unwrap_or("-");
                let tier = result
                    .prize
                    .as_ref()
                    .map(|p| p.tier)
                    .unwrap_or(Tier::Fallback);
                per_tier[tier.index()] += 1;
                println!(
                    "  #{i:<3} {:<7} tier={:<8} prize={prize}",
                    match result.outcome {
                        DrawOutcome::Awarded => "awarded",
                        DrawOutcome::Empty => "empty",
                    },
                    tier.label(),
                );
                i += 1;
            }
            Err(DrawError::QuotaExceeded { .. }) => {
                // Daily quota spent: jump to the next local day, then retry
                // the same draw index.
                clock.advance_days(1);
                println!("  ---  daily quota reached, rolling to the next day");
            }
            Err(err) => {
                println!("  #{i:<3} stopped: {err} [{}]", err.code());
                break;
            }
        }
    }

    let global = state.global_state(&campaign_id, 1);
    let cost = ledger.balance(&args.user, &cost_asset);
    let reward = ledger.balance(&args.user, &reward_asset);
    println!("summary:");
    println!(
        "  committed {committed} draws: high {} / mid {} / low {} / empty {}",
        per_tier[Tier::High.index()],
        per_tier[Tier::Mid.index()],
        per_tier[Tier::Low.index()],
        per_tier[Tier::Fallback.index()],
    );
    if let Some(rate) = global.empty_rate_bps() {
        println!("  historical empty rate: {:.1}%", rate as f64 / 100.0);
    }
    println!("  budget debt: {}", global.budget_debt);
    println!(
        "  balances: {} {cost_asset}, {} {reward_asset}",
        cost.available, reward.available
    );
    Ok(())
}

/// Built-in demo campaign mirroring a typical production setup.
fn demo_policy() -> CampaignPolicy {
    let campaign_id = "demo-campaign".to_string();
    let prize = |id: &str, tier: Tier, weight: u64, value: i64, stock: Stock| Prize {
        id: id.to_string(),
        campaign_id: campaign_id.clone(),
        tier,
        base_weight: weight,
        value,
        initial_stock: stock,
        status: PrizeStatus::Active,
    };
    let rule = |tier: Tier, weight: u64, cap: Option<u32>| TierRule {
        tier,
        base_weight: weight,
        daily_cap_per_user: cap,
        hard_stock_floor: 0,
    };
    CampaignPolicy {
        campaign: Campaign {
            id: campaign_id.clone(),
            status: CampaignStatus::Active,
            cost_asset_code: "POINTS".to_string(),
            reward_asset_code: "COUPON_VALUE".to_string(),
            cost_per_draw: 100,
            daily_quota: 10,
            starts_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid date"),
            ends_at: Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).single().expect("valid date"),
            utc_offset_secs: 8 * 3600,
        },
        tier_rules: vec![
            rule(Tier::High, 50_000, Some(1)),
            rule(Tier::Mid, 150_000, None),
            rule(Tier::Low, 300_000, None),
            rule(Tier::Fallback, 500_000, None),
        ],
        prizes: vec![
            prize("grand-voucher", Tier::High, 50_000, 5_000, Stock::Finite(50)),
            prize("free-entree", Tier::Mid, 100_000, 1_500, Stock::Finite(500)),
            prize("dessert-coupon", Tier::Mid, 50_000, 800, Stock::Finite(500)),
            prize("drink-coupon", Tier::Low, 300_000, 200, Stock::Unlimited),
            prize("thanks-token", Tier::Fallback, 500_000, 0, Stock::Unlimited),
        ],
        pricing: PricingConfig {
            weight_scale: 1_000_000,
            budget_thresholds: [-50_000, 0, 50_000],
            pressure_thresholds: [0, 20_000],
            pressure_window_draws: 100,
            planned_payout_per_draw: 300,
            planned_award_rate_bps: 5_000,
            budget_soft_cap: Some(100_000),
            matrix: TierMatrix::identity_with_b0_floor(),
        },
        pity: PityConfig {
            soft: vec![
                SoftPity {
                    streak: 3,
                    multiplier_bps: 12_000,
                },
                SoftPity {
                    streak: 6,
                    multiplier_bps: 16_000,
                },
            ],
            hard_streak: 9,
        },
        luck_debt: LuckDebtConfig {
            sample_sufficient_threshold: 200,
            expected_empty_rate_bps: 5_000,
            boost_gain_bps: 5_000,
            max_boost_bps: 15_000,
            medium_deviation_bps: 300,
            high_deviation_bps: 800,
        },
        guards: StreakGuardConfig {
            force_nonempty_threshold: 7,
            high_streak_cap: 2,
        },
        last_tiers_capacity: 16,
    }
}
