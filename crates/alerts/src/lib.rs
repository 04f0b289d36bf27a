//! Telegram alerting for significant candles.
//!
//! This crate provides:
//! - Alert message formatting and the symbol menu keyboard
//! - The `ChatTransport` seam with Telegram and dry-run implementations
//! - The `Notifier`, which sends or edits alerts and records them in watch state
//! - Telegram command/button dispatch to an `UpdateHandler`

pub mod format;
pub mod keyboard;
pub mod notifier;
pub mod telegram;
pub mod transport;

pub use format::*;
pub use keyboard::*;
pub use notifier::{Delivery, Notifier};
pub use telegram::{Command, TelegramBot, TelegramError, UpdateHandler};
pub use transport::*;
