//! Domain types for the spread dataset builder.

pub mod bar;
pub mod contract;
pub mod quote;
pub mod spread;

pub use bar::{DailyBar, MinuteBar};
pub use contract::{ContractType, OptionContract};
pub use quote::{AggregatedQuote, Quote};
pub use spread::Spread;
