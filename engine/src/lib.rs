//! Loyalty Lottery Core - Unified Lottery Decision Engine
//!
//! Deterministic draw engine for the loyalty platform: given a user and a
//! campaign, chooses at most one prize, charges the cost asset, credits the
//! reward, and records the decision for audit.
//!
//! # Architecture
//!
//! - **core**: Clock and local-date handling (daily resets)
//! - **models**: Domain types (campaign, policy config, state, assets, draws)
//! - **policy**: Pure tier-resolution calculators and streak guards
//! - **selector**: Weighted tier and prize sampling
//! - **ledger**: Asset balances and the append-only transaction log
//! - **store**: Policy snapshots and mutable engine state
//! - **orchestrator**: The draw pipeline
//! - **rng**: Per-draw seeded random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (smallest currency unit)
//! 2. A draw is exactly-once per (user, idempotency key)
//! 3. All randomness goes through the per-draw seeded RNG; the seed is
//!    recorded in the decision snapshot

// Module declarations
pub mod core;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod rng;
pub mod selector;
pub mod store;

// Re-exports for convenience
pub use self::core::{Clock, FixedClock, SystemClock};
pub use ledger::{LedgerError, LedgerService};
pub use models::{
    campaign::{Campaign, CampaignStatus, Prize, PrizeStatus, Stock, Tier, TierRule},
    config::{CampaignPolicy, ConfigError},
    draw::{DrawOutcome, DrawRecord, DrawResult},
    state::{CampaignGlobalState, UserCampaignState},
};
pub use orchestrator::{
    DrawError, DrawOrchestrator, NullSink, OrchestratorConfig, TraceSink, TracingSink,
};
pub use rng::{DrawRng, FixedSeedSource, OsSeedSource, SeedSource, SequenceSeedSource};
pub use store::{PolicySnapshot, PolicyStore, StateStore};
