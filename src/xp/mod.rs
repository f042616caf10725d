//! XP engine: level table, reward rules and ranking aggregation.
//!
//! Everything in here is pure. Persistence of ledger entries and cached
//! totals lives in `crate::db`.

pub mod config;
pub mod level;
pub mod ranking;
pub mod rules;

pub use config::{Rewards, XpConfig};
pub use level::LevelTable;
