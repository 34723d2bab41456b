//! Draw orchestration
//!
//! The orchestrator is the single entry point of the engine and the only
//! component that maps stage failures to external error kinds, releases
//! reservations, and decides whether a draw record is written.
//!
//! See `engine.rs` for the eight-step draw algorithm.

pub mod engine;
pub mod locks;

pub use engine::{DrawOrchestrator, OrchestratorConfig};
pub use locks::{DrawLockGuard, DrawLockRegistry};

use crate::models::draw::DrawRecord;
use thiserror::Error;

/// Longest accepted idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 64;

/// External error kinds of the draw operation.
///
/// Messages are user-safe: they carry hints (remaining quota, shortfall)
/// but never internal stack traces or raw exception text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DrawError {
    /// Campaign missing, not active, or outside its time window
    #[error("campaign unavailable: {reason}")]
    CampaignUnavailable { reason: String },

    /// Daily quota spent; try again tomorrow
    #[error("daily quota of {quota} draws reached")]
    QuotaExceeded { quota: u32, remaining: u32 },

    /// Cost reservation failed; retryable after a top-up
    #[error("insufficient {asset_code}: need {required}, have {available}")]
    InsufficientFunds {
        asset_code: String,
        required: i64,
        available: i64,
    },

    /// Per-(user, campaign) lock not acquired within the deadline;
    /// retryable with the same idempotency key
    #[error("draw lock not acquired within {timeout_ms} ms")]
    LockTimeout { timeout_ms: u64 },

    /// Even the fallback tier has no stock; campaign misconfiguration
    #[error("no prize stock available, including fallback")]
    StockExhausted,

    /// Policy store returned inconsistent data; must alert
    #[error("campaign configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    /// Unexpected failure after reservation; the reservation was released
    #[error("internal failure: {reason}")]
    InternalFailure { reason: String },
}

impl DrawError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DrawError::CampaignUnavailable { .. } => "CAMPAIGN_UNAVAILABLE",
            DrawError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            DrawError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            DrawError::LockTimeout { .. } => "LOCK_TIMEOUT",
            DrawError::StockExhausted => "STOCK_EXHAUSTED",
            DrawError::ConfigurationInvalid { .. } => "CONFIGURATION_INVALID",
            DrawError::InternalFailure { .. } => "INTERNAL_FAILURE",
        }
    }

    /// Whether the caller may retry (with the same idempotency key).
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            DrawError::LockTimeout { .. } | DrawError::InsufficientFunds { .. }
        )
    }
}

/// Observability sink for committed draws.
///
/// Receives the full decision trace per draw. Not required for correctness;
/// implementations may be asynchronous and lossy.
pub trait TraceSink: Send + Sync {
    fn emit(&self, record: &DrawRecord);
}

/// Default sink: logs the decision trace at debug level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn emit(&self, record: &DrawRecord) {
        tracing::debug!(
            draw_id = %record.id,
            user = %record.user_id,
            campaign = %record.campaign_id,
            outcome = ?record.outcome,
            tier = record.tier.label(),
            prize = record.prize_id.as_deref().unwrap_or("-"),
            seed = record.snapshot.rng_seed,
            "draw decision"
        );
    }
}

/// Sink that drops everything; used in tests and benchmarks.
#[derive(Debug, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn emit(&self, _record: &DrawRecord) {}
}
