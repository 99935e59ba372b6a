//! Analysis modules.
//!
//! Aggregation turns batch files into one table; selection filters, ranks
//! and summarizes that table for charts and reports.

pub mod aggregator;
pub mod select;

pub use aggregator::{aggregate, aggregate_files, discover, AggregateError};
pub use select::*;
