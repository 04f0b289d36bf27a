//! Core data types for candle watching.

pub mod candle;
pub mod error;
pub mod pair;
pub mod timeframe;

pub use candle::*;
pub use error::*;
pub use pair::*;
pub use timeframe::*;
