//! Event detection strategies.
//!
//! Binned extrema, EMA crossovers and volatility peaks are independent
//! lenses over the same tick table. Each sits behind [`EventDetector`] and
//! [`detect`] picks one from the configuration.

use crate::binning::bin_ticks;
use crate::classifier::EventClassifier;
use crate::crossover::{crossover_events, filter_events};
use crate::volatility::segment;
use drift_core::config::{CrossoverConfig, VolatilityConfig};
use drift_core::{
    Config, CrossoverEvent, Detection, DetectorKind, Event, Result, RowError, Seconds, TickTable,
    TimeBucket, VolatilityPeak,
};
use tracing::info;

/// A strategy turning ticks into events.
pub trait EventDetector {
    type Event;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Run detection over a time-ordered tick table.
    fn detect_events(&self, ticks: &TickTable) -> Result<Detection<Self::Event>>;
}

/// Time buckets classified by the order of their extrema.
#[derive(Debug, Clone)]
pub struct BinnedExtremaDetector {
    bucket_size: Seconds,
    classifier: EventClassifier,
}

impl BinnedExtremaDetector {
    pub fn new(bucket_size: Seconds, delays: Vec<Seconds>) -> Self {
        Self {
            bucket_size,
            classifier: EventClassifier::new(delays),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.binning.bucket_size, config.drift.delays.clone())
    }

    pub fn bucket_size(&self) -> Seconds {
        self.bucket_size
    }

    /// Bin ticks with this detector's bucket size.
    pub fn buckets(&self, ticks: &TickTable) -> Result<Vec<TimeBucket>> {
        bin_ticks(ticks, self.bucket_size)
    }

    /// Classify buckets that were already built from `ticks`.
    pub fn classify(&self, ticks: &TickTable, buckets: &[TimeBucket]) -> Detection<Event> {
        self.classifier.classify(ticks, buckets)
    }
}

impl EventDetector for BinnedExtremaDetector {
    type Event = Event;

    fn name(&self) -> &'static str {
        "binned_extrema"
    }

    fn detect_events(&self, ticks: &TickTable) -> Result<Detection<Event>> {
        let buckets = self.buckets(ticks)?;
        Ok(self.classify(ticks, &buckets))
    }
}

/// Intervals between EMA crossings, reduced to short outliers.
#[derive(Debug, Clone)]
pub struct CrossoverDetector {
    config: CrossoverConfig,
}

impl CrossoverDetector {
    pub fn new(config: CrossoverConfig) -> Self {
        Self { config }
    }
}

impl EventDetector for CrossoverDetector {
    type Event = CrossoverEvent;

    fn name(&self) -> &'static str {
        "ema_crossover"
    }

    fn detect_events(&self, ticks: &TickTable) -> Result<Detection<CrossoverEvent>> {
        let raw = crossover_events(ticks, &self.config)?;
        let events = filter_events(&raw.events, self.config.max_duration, self.config.outlier_k);
        Ok(Detection::new(events, raw.errors))
    }
}

/// Significant peaks of the EMA variance.
#[derive(Debug, Clone)]
pub struct VolatilityPeakDetector {
    config: VolatilityConfig,
}

impl VolatilityPeakDetector {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }
}

impl EventDetector for VolatilityPeakDetector {
    type Event = VolatilityPeak;

    fn name(&self) -> &'static str {
        "volatility_peak"
    }

    fn detect_events(&self, ticks: &TickTable) -> Result<Detection<VolatilityPeak>> {
        Ok(Detection::new(segment(ticks, &self.config)?, Vec::new()))
    }
}

/// Output of whichever detector ran.
#[derive(Debug)]
pub enum EventTable {
    Binned(Detection<Event>),
    Crossover(Detection<CrossoverEvent>),
    Volatility(Detection<VolatilityPeak>),
}

impl EventTable {
    pub fn kind(&self) -> DetectorKind {
        match self {
            EventTable::Binned(_) => DetectorKind::BinnedExtrema,
            EventTable::Crossover(_) => DetectorKind::EmaCrossover,
            EventTable::Volatility(_) => DetectorKind::VolatilityPeak,
        }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        match self {
            EventTable::Binned(d) => d.events.len(),
            EventTable::Crossover(d) => d.events.len(),
            EventTable::Volatility(d) => d.events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn errors(&self) -> &[RowError] {
        match self {
            EventTable::Binned(d) => &d.errors,
            EventTable::Crossover(d) => &d.errors,
            EventTable::Volatility(d) => &d.errors,
        }
    }

    /// Binned events, if this table holds them.
    pub fn binned(&self) -> Option<&Detection<Event>> {
        match self {
            EventTable::Binned(d) => Some(d),
            _ => None,
        }
    }
}

fn run<D: EventDetector>(detector: &D, ticks: &TickTable) -> Result<Detection<D::Event>> {
    let detection = detector.detect_events(ticks)?;
    info!(
        detector = detector.name(),
        ticks = ticks.len(),
        events = detection.events.len(),
        errors = detection.errors.len(),
        "detection complete"
    );
    Ok(detection)
}

/// Run the detector selected by `config.detector`.
pub fn detect(ticks: &TickTable, config: &Config) -> Result<EventTable> {
    config.validate()?;
    Ok(match config.detector {
        DetectorKind::BinnedExtrema => {
            EventTable::Binned(run(&BinnedExtremaDetector::from_config(config), ticks)?)
        }
        DetectorKind::EmaCrossover => {
            EventTable::Crossover(run(&CrossoverDetector::new(config.crossover.clone()), ticks)?)
        }
        DetectorKind::VolatilityPeak => {
            EventTable::Volatility(run(&VolatilityPeakDetector::new(config.volatility.clone()), ticks)?)
        }
    })
}
