//! Human-readable reports.
//!
//! This module renders analyzer output for people:
//! - Money and percentage formatting
//! - Executive summary text report
//! - Ledger-wide statistics

pub mod format;
pub mod stats;
pub mod summary;


pub use format::{format_amount, format_dollars, format_pct};
pub use stats::BudgetStats;
pub use summary::ExecutiveSummary;
