//! End-to-end drift analysis.
//!
//! Order-book rows go through mid-price derivation, binning and
//! classification in one batch pass. Each stage returns a new value.

use drift_core::{Config, Detection, Event, OrderBookRecord, Result, TickTable, TimeBucket};
use drift_events::{detect, BinnedExtremaDetector, EventTable};
use drift_ingestion::derive_ticks;
use tracing::{debug, info, warn};

/// Everything one binned-extrema pass produced.
#[derive(Debug)]
pub struct AnalysisRun {
    pub ticks: TickTable,
    pub buckets: Vec<TimeBucket>,
    pub detection: Detection<Event>,
}

impl AnalysisRun {
    pub fn events(&self) -> &[Event] {
        &self.detection.events
    }

    /// Events with a non-zero size bucket.
    pub fn sized_events(&self) -> impl Iterator<Item = &Event> {
        self.detection.events.iter().filter(|e| e.size_bucket != 0)
    }
}

/// Batch runner for the analysis stages.
pub struct DriftAnalyser {
    config: Config,
}

impl DriftAnalyser {
    /// Create an analyser; the configuration is validated up front.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mid prices, buckets and classified events for one order-book table.
    pub fn run(&self, records: &[OrderBookRecord]) -> Result<AnalysisRun> {
        let ticks = derive_ticks(records);
        debug!(ticks = ticks.len(), "derived mid prices");

        let detector = BinnedExtremaDetector::from_config(&self.config);
        let buckets = detector.buckets(&ticks)?;
        debug!(buckets = buckets.len(), bucket_size = detector.bucket_size(), "binned ticks");

        let detection = detector.classify(&ticks, &buckets);
        for row in &detection.errors {
            warn!(%row, "row error");
        }
        info!(
            ticks = ticks.len(),
            buckets = buckets.len(),
            events = detection.events.len(),
            errors = detection.errors.len(),
            "analysis complete"
        );

        Ok(AnalysisRun {
            ticks,
            buckets,
            detection,
        })
    }

    /// Run whichever detector the configuration selects.
    pub fn detect(&self, records: &[OrderBookRecord]) -> Result<(TickTable, EventTable)> {
        let ticks = derive_ticks(records);
        let table = detect(&ticks, &self.config)?;
        Ok((ticks, table))
    }
}
