//! Domain models for the lottery decision engine

pub mod asset;
pub mod campaign;
pub mod config;
pub mod draw;
pub mod state;

// Re-exports
pub use asset::{AssetBalance, AssetTransaction, BusinessType};
pub use campaign::{Campaign, CampaignStatus, Prize, PrizeStatus, Stock, Tier, TierRule};
pub use config::{
    BudgetTier, CampaignPolicy, ConfigError, LuckDebtConfig, PityConfig, PressureTier,
    PricingConfig, SoftPity, StreakGuardConfig, TierMatrix, TierMultipliers,
};
pub use draw::{
    BalanceSnapshot, DecisionSnapshot, DrawOutcome, DrawRecord, DrawResult, PrizeDescriptor,
    SnapshotInputs,
};
pub use state::{CampaignGlobalState, PressureWindow, TierRing, UserCampaignState};
