//! Configuration structures for the feed-drift system.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for an analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time binning configuration.
    pub binning: BinningConfig,
    /// Post-event drift sampling configuration.
    pub drift: DriftConfig,
    /// EMA crossover engine configuration.
    pub crossover: CrossoverConfig,
    /// Volatility peak segmenter configuration.
    pub volatility: VolatilityConfig,
    /// Which event definition to run.
    pub detector: DetectorKind,
}

impl Config {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check value ranges across all sections.
    pub fn validate(&self) -> Result<()> {
        self.binning.validate()?;
        self.drift.validate()?;
        self.crossover.validate()?;
        self.volatility.validate()
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{name} must be positive and finite, got {value}")))
    }
}

/// Event definition selected for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Extrema of fixed-width time buckets.
    #[default]
    BinnedExtrema,
    /// Intervals between short/long EMA crossings.
    EmaCrossover,
    /// Significant peaks of the EMA variance.
    VolatilityPeak,
}

impl std::str::FromStr for DetectorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binned_extrema" | "binned" => Ok(DetectorKind::BinnedExtrema),
            "ema_crossover" | "crossover" => Ok(DetectorKind::EmaCrossover),
            "volatility_peak" | "volatility" => Ok(DetectorKind::VolatilityPeak),
            other => Err(Error::config(format!("unknown detector '{other}'"))),
        }
    }
}

/// Time binning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Bucket width in seconds.
    pub bucket_size: f64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self { bucket_size: 0.1 }
    }
}

impl BinningConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("binning.bucket_size", self.bucket_size)
    }
}

/// Post-event drift configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Delays after event end at which the as-of price is sampled (seconds).
    pub delays: Vec<f64>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            delays: vec![0.1, 0.2, 0.5, 1.0, 2.0],
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<()> {
        match self.delays.iter().find(|d| !d.is_finite() || **d < 0.0) {
            Some(d) => Err(Error::config(format!(
                "drift.delays must be non-negative and finite, got {d}"
            ))),
            None => Ok(()),
        }
    }
}

/// EMA crossover engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    /// Half-life of the short EMA (seconds).
    pub short_half_life: f64,
    /// Half-life of the long EMA (seconds).
    pub long_half_life: f64,
    /// Events must last strictly less than this (seconds).
    pub max_duration: f64,
    /// Outlier band width in standard deviations.
    pub outlier_k: f64,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            short_half_life: 1.0,
            long_half_life: 10.0,
            max_duration: 60.0,
            outlier_k: 1.5,
        }
    }
}

impl CrossoverConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("crossover.short_half_life", self.short_half_life)?;
        require_positive("crossover.long_half_life", self.long_half_life)?;
        require_positive("crossover.max_duration", self.max_duration)?;
        if self.short_half_life >= self.long_half_life {
            return Err(Error::config(format!(
                "crossover.short_half_life ({}) must be below long_half_life ({})",
                self.short_half_life, self.long_half_life
            )));
        }
        if !self.outlier_k.is_finite() || self.outlier_k < 0.0 {
            return Err(Error::config(format!(
                "crossover.outlier_k must be non-negative, got {}",
                self.outlier_k
            )));
        }
        Ok(())
    }
}

/// Volatility peak segmenter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    /// Half-life of the EMA variance (seconds).
    pub half_life: f64,
    /// Peak threshold: mean + threshold_std * std of the variance series.
    pub threshold_std: f64,
    /// Relative height at which peak widths are measured.
    pub rel_height: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            half_life: 1.0,
            threshold_std: 2.0,
            rel_height: 0.99,
        }
    }
}

impl VolatilityConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("volatility.half_life", self.half_life)?;
        if !self.threshold_std.is_finite() {
            return Err(Error::config("volatility.threshold_std must be finite"));
        }
        if !(self.rel_height > 0.0 && self.rel_height <= 1.0) {
            return Err(Error::config(format!(
                "volatility.rel_height must be in (0, 1], got {}",
                self.rel_height
            )));
        }
        Ok(())
    }
}
