//! Error types for the feed-drift system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the feed-drift system.
#[derive(Error, Debug)]
pub enum Error {
    /// Byte buffer length is not an exact multiple of the record width.
    #[error("Malformed record: {len} bytes is not a multiple of the {width}-byte record width (partial record at offset {offset})")]
    MalformedRecord {
        len: usize,
        width: usize,
        offset: usize,
    },

    /// A ratio whose denominator is exactly zero.
    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    /// Drift normalization against a zero-size move (P1 == P0).
    #[error("Undefined ratio: {0}")]
    UndefinedRatio(String),

    /// As-of lookup before the first observation.
    #[error("No observation at or before t={timestamp}{}", first_hint(.first))]
    NoPriorObservation {
        timestamp: f64,
        first: Option<f64>,
    },

    /// A bucket with no ticks was asked for its statistics.
    #[error("Empty bucket at key {0}")]
    EmptyBucket(i64),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// Insufficient data for computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn first_hint(first: &Option<f64>) -> String {
    match first {
        Some(t) => format!(" (first tick at t={t})"),
        None => " (table is empty)".to_string(),
    }
}

impl Error {
    /// Create a division-by-zero error.
    pub fn division_by_zero(msg: impl Into<String>) -> Self {
        Error::DivisionByZero(msg.into())
    }

    /// Create an undefined-ratio error.
    pub fn undefined_ratio(msg: impl Into<String>) -> Self {
        Error::UndefinedRatio(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }
}

/// Where in a batch a localized error happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowLocation {
    /// Time bucket, by bucket number.
    Bucket(i64),
    /// Event, by its end time (seconds).
    EventEnd(f64),
    /// Index into the tick table.
    TickIndex(usize),
}

impl std::fmt::Display for RowLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowLocation::Bucket(key) => write!(f, "bucket {key}"),
            RowLocation::EventEnd(t) => write!(f, "event ending at t={t}"),
            RowLocation::TickIndex(i) => write!(f, "tick #{i}"),
        }
    }
}

/// A per-row failure collected alongside successful results.
///
/// One broken bucket or event never aborts the rest of a batch; the
/// failure is kept here instead.
#[derive(Debug)]
pub struct RowError {
    pub location: RowLocation,
    pub error: Error,
}

impl RowError {
    pub fn new(location: RowLocation, error: Error) -> Self {
        Self { location, error }
    }
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}
