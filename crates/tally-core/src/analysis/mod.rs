//! Transaction analysis
//!
//! A pure statistics pass over a transaction list: totals, per-category
//! spending patterns with trends, savings opportunities, outliers and a
//! month-by-month cash flow table. Nothing here touches the network or disk.

mod analyzer;
mod savings;
mod types;

pub use analyzer::{analyze, classify_trend, Analyzer};
pub use savings::{
    CategoryOverspendDetector, HighFrequencySmallDetector, RecurringSubscriptionDetector,
    SavingsDetector, UnusualSpikeDetector,
};
pub use types::*;
