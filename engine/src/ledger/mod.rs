//! Asset ledger
//!
//! In-memory ledger holding per-(user, asset) balances, in-flight
//! reservations and the append-only transaction log. Every operation is
//! idempotent by its business key: replaying a completed operation is a
//! no-op that succeeds, replaying with different parameters is a conflict.
//!
//! # Critical Invariants
//!
//! - `available >= 0` and `reserved >= 0` at all times
//! - (business_type, business_key) is unique in the transaction log
//! - reserve/commit/release/credit are the only balance mutations
//!
//! The interior is serialised on one mutex; operations touch a single
//! (user, asset) row, so the per-row ordering the schema demands holds a
//! fortiori.

use crate::core::Clock;
use crate::models::asset::{AssetBalance, AssetTransaction, BusinessType};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds in {asset_code}: required {required}, available {available}")]
    InsufficientFunds {
        asset_code: String,
        required: i64,
        available: i64,
    },

    #[error("business key {0} already used with different parameters")]
    KeyConflict(String),

    #[error("unknown reservation {0}")]
    UnknownReservation(String),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservationState {
    Held,
    Committed,
    Released,
}

#[derive(Debug, Clone)]
struct Reservation {
    user_id: String,
    asset_code: String,
    amount: i64,
    state: ReservationState,
}

#[derive(Debug, Default)]
struct Inner {
    balances: HashMap<(String, String), AssetBalance>,
    reservations: HashMap<String, Reservation>,
    log: Vec<AssetTransaction>,
    used_keys: HashSet<(BusinessType, String)>,
}

impl Inner {
    fn balance_mut(&mut self, user_id: &str, asset_code: &str) -> &mut AssetBalance {
        self.balances
            .entry((user_id.to_string(), asset_code.to_string()))
            .or_default()
    }

    fn append(
        &mut self,
        user_id: &str,
        asset_code: &str,
        delta: i64,
        business_type: BusinessType,
        business_key: &str,
        created_at: chrono::DateTime<chrono::Utc>,
    ) {
        let inserted = self
            .used_keys
            .insert((business_type, business_key.to_string()));
        debug_assert!(inserted, "duplicate (business_type, business_key)");
        self.log.push(AssetTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            asset_code: asset_code.to_string(),
            delta,
            business_type,
            business_key: business_key.to_string(),
            created_at,
        });
    }
}

/// The asset ledger. Cheap to clone via `Arc`; share one per process.
pub struct LedgerService {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl LedgerService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Current balance of one (user, asset) pair; zero if never touched.
    pub fn balance(&self, user_id: &str, asset_code: &str) -> AssetBalance {
        self.inner
            .lock()
            .balances
            .get(&(user_id.to_string(), asset_code.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Increase `available`, appending a positive transaction.
    ///
    /// Idempotent by `(business_type, key)`: a replay changes nothing and
    /// returns the current balance.
    pub fn credit(
        &self,
        user_id: &str,
        asset_code: &str,
        amount: i64,
        business_type: BusinessType,
        key: &str,
    ) -> Result<AssetBalance, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();
        if inner
            .used_keys
            .contains(&(business_type, key.to_string()))
        {
            return Ok(*inner.balance_mut(user_id, asset_code));
        }
        let balance = inner.balance_mut(user_id, asset_code);
        balance.available += amount;
        let snapshot = *balance;
        inner.append(user_id, asset_code, amount, business_type, key, now);
        Ok(snapshot)
    }

    /// Move `amount` from available to reserved.
    ///
    /// Fails with `InsufficientFunds` when available < amount. Replaying an
    /// existing reservation with identical parameters is a no-op; different
    /// parameters are a conflict.
    pub fn reserve(
        &self,
        user_id: &str,
        asset_code: &str,
        amount: i64,
        key: &str,
    ) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.reservations.get(key) {
            if existing.user_id == user_id
                && existing.asset_code == asset_code
                && existing.amount == amount
            {
                return Ok(());
            }
            return Err(LedgerError::KeyConflict(key.to_string()));
        }

        let balance = inner.balance_mut(user_id, asset_code);
        if balance.available < amount {
            return Err(LedgerError::InsufficientFunds {
                asset_code: asset_code.to_string(),
                required: amount,
                available: balance.available,
            });
        }
        balance.available -= amount;
        balance.reserved += amount;
        inner.reservations.insert(
            key.to_string(),
            Reservation {
                user_id: user_id.to_string(),
                asset_code: asset_code.to_string(),
                amount,
                state: ReservationState::Held,
            },
        );
        Ok(())
    }

    /// Settle a held reservation: reserved drops by the amount and a
    /// negative `DrawCost` transaction is appended under the same key.
    ///
    /// Committing twice is a no-op; committing a released reservation is an
    /// error.
    pub fn commit(&self, key: &str) -> Result<(), LedgerError> {
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();
        let reservation = inner
            .reservations
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownReservation(key.to_string()))?;

        match reservation.state {
            ReservationState::Committed => Ok(()),
            ReservationState::Released => Err(LedgerError::UnknownReservation(key.to_string())),
            ReservationState::Held => {
                let balance =
                    inner.balance_mut(&reservation.user_id, &reservation.asset_code);
                balance.reserved -= reservation.amount;
                inner.append(
                    &reservation.user_id,
                    &reservation.asset_code,
                    -reservation.amount,
                    BusinessType::DrawCost,
                    key,
                    now,
                );
                if let Some(r) = inner.reservations.get_mut(key) {
                    r.state = ReservationState::Committed;
                }
                Ok(())
            }
        }
    }

    /// Return a held reservation to available. No transaction is emitted.
    ///
    /// Releasing twice is a no-op; releasing a committed reservation is also
    /// a no-op (the money is already settled, there is nothing to return).
    pub fn release(&self, key: &str) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let reservation = inner
            .reservations
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownReservation(key.to_string()))?;

        match reservation.state {
            ReservationState::Released | ReservationState::Committed => Ok(()),
            ReservationState::Held => {
                let balance =
                    inner.balance_mut(&reservation.user_id, &reservation.asset_code);
                balance.reserved -= reservation.amount;
                balance.available += reservation.amount;
                if let Some(r) = inner.reservations.get_mut(key) {
                    r.state = ReservationState::Released;
                }
                Ok(())
            }
        }
    }

    /// Append-only log entries for one user, in insertion order.
    pub fn transactions_for(&self, user_id: &str) -> Vec<AssetTransaction> {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Count of log entries matching a (business_type, key) pair; used by
    /// tests to assert exactly-once semantics.
    pub fn transaction_count(&self, business_type: BusinessType, key: &str) -> usize {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|tx| tx.business_type == business_type && tx.business_key == key)
            .count()
    }
}
