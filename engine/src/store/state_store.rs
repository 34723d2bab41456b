//! Mutable engine state
//!
//! Holds per-(user, campaign) experience state, campaign-global aggregates,
//! live prize inventory and the draw-record log. The unique
//! (user, idempotency_key) index on draw records is the idempotency source
//! of truth; lookups before commit are an optimisation.
//!
//! Writers are serialised by the orchestrator's per-(user, campaign) lock;
//! the interior mutexes only protect map integrity. Stock decrements are
//! atomic test-and-decrement, the one contention point shared across users.

use crate::models::campaign::{Prize, Stock};
use crate::models::draw::DrawRecord;
use crate::models::state::{CampaignGlobalState, UserCampaignState};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct DrawLog {
    records: Vec<DrawRecord>,
    /// (user_id, idempotency_key) → index into `records`
    index: HashMap<(String, String), usize>,
}

/// In-memory state store.
#[derive(Default)]
pub struct StateStore {
    users: Mutex<HashMap<(String, String), UserCampaignState>>,
    globals: Mutex<HashMap<String, CampaignGlobalState>>,
    inventory: Mutex<HashMap<String, Stock>>,
    draws: Mutex<DrawLog>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure every catalogue prize has an inventory row. Existing rows are
    /// left untouched, so re-seeding after a policy reload never resets
    /// live stock.
    pub fn seed_inventory(&self, prizes: &[Prize]) {
        let mut inventory = self.inventory.lock();
        for prize in prizes {
            inventory
                .entry(prize.id.clone())
                .or_insert(prize.initial_stock);
        }
    }

    /// Live stock for a prize.
    pub fn remaining_stock(&self, prize_id: &str) -> Option<Stock> {
        self.inventory.lock().get(prize_id).copied()
    }

    /// Atomically consume one unit if stock stays above `floor`.
    ///
    /// Returns false when the prize is unknown, finite at or below the
    /// floor, or already exhausted; the caller treats that as a stock race.
    pub fn try_consume_stock(&self, prize_id: &str, floor: u32) -> bool {
        let mut inventory = self.inventory.lock();
        match inventory.get_mut(prize_id) {
            None => false,
            Some(Stock::Unlimited) => true,
            Some(Stock::Finite(n)) => {
                if *n > floor {
                    *n -= 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Per-(user, campaign) state with the daily reset applied for `today`.
    /// Creates a fresh state on first draw.
    pub fn user_state(
        &self,
        user_id: &str,
        campaign_id: &str,
        today: NaiveDate,
        ring_capacity: usize,
    ) -> UserCampaignState {
        let mut users = self.users.lock();
        let state = users
            .entry((user_id.to_string(), campaign_id.to_string()))
            .or_insert_with(|| UserCampaignState::new(user_id, campaign_id, today, ring_capacity));
        state.roll_to(today);
        state.clone()
    }

    /// Persist an updated per-user state.
    pub fn put_user_state(&self, state: UserCampaignState) {
        self.users.lock().insert(
            (state.user_id.clone(), state.campaign_id.clone()),
            state,
        );
    }

    /// Campaign-global aggregates, created empty on first access.
    pub fn global_state(&self, campaign_id: &str, window_capacity: usize) -> CampaignGlobalState {
        self.globals
            .lock()
            .entry(campaign_id.to_string())
            .or_insert_with(|| CampaignGlobalState::new(campaign_id, window_capacity))
            .clone()
    }

    pub fn put_global_state(&self, state: CampaignGlobalState) {
        self.globals.lock().insert(state.campaign_id.clone(), state);
    }

    /// Stored draw for (user, idempotency key), if committed.
    pub fn find_draw(&self, user_id: &str, idempotency_key: &str) -> Option<DrawRecord> {
        let draws = self.draws.lock();
        draws
            .index
            .get(&(user_id.to_string(), idempotency_key.to_string()))
            .map(|&i| draws.records[i].clone())
    }

    /// Insert a draw record, enforcing the unique (user, idempotency_key)
    /// index. On violation the stored record is returned and nothing is
    /// written.
    pub fn insert_draw(&self, record: DrawRecord) -> Result<(), Box<DrawRecord>> {
        let mut draws = self.draws.lock();
        let key = (record.user_id.clone(), record.idempotency_key.clone());
        if let Some(&existing) = draws.index.get(&key) {
            return Err(Box::new(draws.records[existing].clone()));
        }
        draws.records.push(record);
        let idx = draws.records.len() - 1;
        draws.index.insert(key, idx);
        Ok(())
    }

    /// Committed draws for one user in a campaign, insertion order.
    pub fn draws_for_user(&self, user_id: &str, campaign_id: &str) -> Vec<DrawRecord> {
        self.draws
            .lock()
            .records
            .iter()
            .filter(|r| r.user_id == user_id && r.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    /// Total committed draws in a campaign; used by tests and stats.
    pub fn draw_count(&self, campaign_id: &str) -> usize {
        self.draws
            .lock()
            .records
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::campaign::{PrizeStatus, Tier};
    use crate::models::draw::{DecisionSnapshot, DrawOutcome, SnapshotInputs};
    use crate::policy::WeightVector;
    use chrono::{TimeZone, Utc};

    fn prize(id: &str, stock: Stock) -> Prize {
        Prize {
            id: id.to_string(),
            campaign_id: "C1".to_string(),
            tier: Tier::Low,
            base_weight: 100,
            value: 200,
            initial_stock: stock,
            status: PrizeStatus::Active,
        }
    }

    fn record(user: &str, key: &str) -> DrawRecord {
        DrawRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.to_string(),
            campaign_id: "C1".to_string(),
            idempotency_key: key.to_string(),
            outcome: DrawOutcome::Empty,
            tier: Tier::Fallback,
            prize_id: None,
            prize_value: 0,
            cost_asset_code: "POINTS".to_string(),
            cost_amount: 100,
            balances: vec![],
            snapshot: DecisionSnapshot {
                policy_version: 1,
                rng_seed: 1,
                inputs: SnapshotInputs {
                    empty_streak: 0,
                    high_streak: 0,
                    total_draws_today: 0,
                    budget_debt: 0,
                    pressure: 0,
                    cumulative_draws: 0,
                    cumulative_empties: 0,
                },
                base_weights: WeightVector::ZERO,
                stages: vec![],
                final_weights: WeightVector::ZERO,
                sampled_tier: Tier::Fallback,
                guards: vec![],
                final_tier: Tier::Fallback,
                prize_id: None,
            },
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_seed_inventory_preserves_live_stock() {
        let store = StateStore::new();
        store.seed_inventory(&[prize("p1", Stock::Finite(5))]);
        assert!(store.try_consume_stock("p1", 0));
        // Re-seed must not reset the decremented stock
        store.seed_inventory(&[prize("p1", Stock::Finite(5))]);
        assert_eq!(store.remaining_stock("p1"), Some(Stock::Finite(4)));
    }

    #[test]
    fn test_stock_never_goes_negative() {
        let store = StateStore::new();
        store.seed_inventory(&[prize("p1", Stock::Finite(1))]);
        assert!(store.try_consume_stock("p1", 0));
        assert!(!store.try_consume_stock("p1", 0));
        assert_eq!(store.remaining_stock("p1"), Some(Stock::Finite(0)));
    }

    #[test]
    fn test_stock_floor_blocks_consumption() {
        let store = StateStore::new();
        store.seed_inventory(&[prize("p1", Stock::Finite(3))]);
        assert!(!store.try_consume_stock("p1", 3));
        assert!(store.try_consume_stock("p1", 2));
    }

    #[test]
    fn test_draw_index_is_unique() {
        let store = StateStore::new();
        store.insert_draw(record("U", "k1")).unwrap();
        let duplicate = store.insert_draw(record("U", "k1"));
        assert!(duplicate.is_err());
        assert_eq!(store.draw_count("C1"), 1);

        // Same key for a different user is a different draw
        store.insert_draw(record("V", "k1")).unwrap();
        assert_eq!(store.draw_count("C1"), 2);
    }

    #[test]
    fn test_user_state_rolls_daily() {
        let store = StateStore::new();
        let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let mut state = store.user_state("U", "C1", day1, 8);
        state.apply_draw(Tier::Fallback);
        store.put_user_state(state);

        let rolled = store.user_state("U", "C1", day2, 8);
        assert_eq!(rolled.total_draws_today, 0);
        assert_eq!(rolled.empty_streak, 1, "streaks survive the daily reset");
    }
}
