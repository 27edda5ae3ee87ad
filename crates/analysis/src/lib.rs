//! Drift analysis for the feed-drift system.
//!
//! This crate provides:
//! - The batch pipeline from order-book rows to classified events
//! - Per-delay export sheets of normalized drift
//! - Drift statistics by delay and size bucket
//! - Relative change distribution and basic feed statistics

pub mod distribution;
pub mod pipeline;
pub mod report;
pub mod sheets;
pub mod summary;

pub use distribution::ChangeDistribution;
pub use pipeline::{AnalysisRun, DriftAnalyser};
pub use report::{DriftReport, DriftStats};
pub use sheets::{export_sheets, write_sheets, DriftRow, DriftSheet};
pub use summary::FeedSummary;
