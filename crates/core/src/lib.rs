//! Core types and configuration for the feed-drift system.
//!
//! This crate provides shared types used across all other crates:
//! - Feed records (order-book quotes, public trades) and ticks
//! - Buckets and the three event models
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, DetectorKind};
pub use error::{Error, Result, RowError, RowLocation};
pub use types::*;
