//! Policy and state stores
//!
//! - [`PolicyStore`]: read-mostly cache of validated campaign policy
//!   snapshots, swapped atomically on admin writes.
//! - [`StateStore`]: mutable per-user and campaign-global state, prize
//!   inventory, and the draw-record log with its unique idempotency index.

pub mod policy_store;
pub mod state_store;

pub use policy_store::{PolicySnapshot, PolicyStore};
pub use state_store::StateStore;
