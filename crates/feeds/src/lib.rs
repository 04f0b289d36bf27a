//! Candle data collection from exchanges.
//!
//! ## Architecture
//!
//! - `source` - `CandleSource` trait, the exchange collaborator contract
//! - `rest` - Bybit v5 REST implementation of `CandleSource`
//! - `auth` - optional API credential signing
//! - `fetcher` - picks the last closed candle for a series

pub mod auth;
pub mod error;
pub mod fetcher;
pub mod rest;
pub mod source;

pub use auth::*;
pub use error::*;
pub use fetcher::*;
pub use rest::*;
pub use source::*;
