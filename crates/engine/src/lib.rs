//! Candle screening engine.
//!
//! This crate decides which closed candles are worth announcing:
//! - `significance` - percentage-change threshold with per-symbol timestamp gating
//! - `dedup` - similarity-based suppression of repeated notifications
//! - `state` - process-wide watch state shared by the poll loop and the bot

pub mod dedup;
pub mod significance;
pub mod state;

pub use dedup::*;
pub use significance::*;
pub use state::*;
