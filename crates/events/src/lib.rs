//! Event detection over the mid-price series.
//!
//! This crate handles:
//! - Fixed-width time binning with extrema tracking
//! - Directional event classification and size buckets
//! - As-of sampling of post-event drift
//! - Time-weighted EMAs and crossover events
//! - Volatility peak segmentation

pub mod binning;
pub mod classifier;
pub mod crossover;
pub mod detector;
pub mod ema;
pub mod sampler;
pub mod volatility;

pub use binning::{bin_ticks, find_bucket};
pub use classifier::{classify_bucket, size_bucket, EventClassifier};
pub use crossover::{crossover_events, filter_events, find_crossings, Crossings};
pub use detector::{
    detect, BinnedExtremaDetector, CrossoverDetector, EventDetector, EventTable,
    VolatilityPeakDetector,
};
pub use ema::{ewm_mean, TimeEma};
pub use sampler::{normalized_drift, post_event_relative_change, ForwardSampler};
pub use volatility::{ewm_variance, find_peaks, segment};
