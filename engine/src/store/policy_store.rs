//! Policy snapshot cache
//!
//! The admin/authoring subsystem publishes campaign configuration; the
//! engine reads it through immutable snapshots. Each install validates the
//! document, stamps it with a monotonic version and a SHA-256 hash of its
//! canonical JSON, and swaps it in atomically behind a read-write lock.
//! Draws decided under version N record N in their decision snapshot, so an
//! audit can join any draw to the exact configuration it saw.

use crate::models::config::{CampaignPolicy, ConfigError};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Install failures.
#[derive(Debug, Error)]
pub enum PolicyStoreError {
    #[error("invalid campaign policy: {0}")]
    Invalid(#[from] ConfigError),

    #[error("policy document is not serialisable: {0}")]
    Unserialisable(#[from] serde_json::Error),
}

impl PolicyStoreError {
    /// Machine-readable code, shared with the draw error taxonomy: a
    /// rejected document carries the same `CONFIGURATION_INVALID` code at
    /// load time that the orchestrator reports at draw time.
    pub fn code(&self) -> &'static str {
        match self {
            PolicyStoreError::Invalid(_) => "CONFIGURATION_INVALID",
            PolicyStoreError::Unserialisable(_) => "INTERNAL_FAILURE",
        }
    }
}

/// One published, validated configuration.
#[derive(Debug)]
pub struct PolicySnapshot {
    /// Monotonic per-store version
    pub version: u64,

    /// SHA-256 of the canonical JSON document
    pub config_hash: String,

    pub policy: CampaignPolicy,
}

/// Read-mostly snapshot cache keyed by campaign id.
pub struct PolicyStore {
    snapshots: RwLock<HashMap<String, Arc<PolicySnapshot>>>,
    next_version: AtomicU64,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Validate and publish a policy document. Returns the assigned version.
    ///
    /// Malformed configuration is rejected here, before any draw can see
    /// it, with the `CONFIGURATION_INVALID` code.
    pub fn install(&self, policy: CampaignPolicy) -> Result<u64, PolicyStoreError> {
        policy.validate()?;
        self.publish(policy)
    }

    /// Publish a policy document without validating it.
    ///
    /// Used when republishing a historical snapshot verbatim (and by tests
    /// that need a malformed snapshot in place). The orchestrator
    /// re-validates every loaded snapshot, so a bad document published
    /// through this path fails each draw with `ConfigurationInvalid`
    /// instead of being trusted.
    pub fn install_unchecked(&self, policy: CampaignPolicy) -> Result<u64, PolicyStoreError> {
        self.publish(policy)
    }

    fn publish(&self, policy: CampaignPolicy) -> Result<u64, PolicyStoreError> {
        let canonical = serde_json::to_vec(&policy)?;
        let config_hash = hex_digest(&canonical);
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(PolicySnapshot {
            version,
            config_hash,
            policy,
        });
        let campaign_id = snapshot.policy.campaign.id.clone();
        self.snapshots.write().insert(campaign_id, snapshot);
        Ok(version)
    }

    /// Current snapshot for a campaign, if one is published.
    pub fn load(&self, campaign_id: &str) -> Option<Arc<PolicySnapshot>> {
        self.snapshots.read().get(campaign_id).cloned()
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
