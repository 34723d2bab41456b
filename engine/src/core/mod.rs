//! Time management for the draw engine
//!
//! The engine reasons about calendar days in a campaign-configured timezone.
//! This module provides the injectable clock and local-date derivation.

pub mod clock;

pub use clock::{local_date, Clock, FixedClock, SystemClock};
