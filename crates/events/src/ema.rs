//! Time-weighted exponential moving averages over irregular timestamps.
//!
//! An observation `dt` seconds old carries weight `0.5^(dt / half_life)`.
//! The average is normalized by the total weight seen so far, so the first
//! value is the first observation rather than a blend with zero.

use drift_core::{Error, Result, Seconds};

/// Streaming time-weighted EMA of a value and its square.
#[derive(Debug, Clone)]
pub struct TimeEma {
    half_life: Seconds,
    last_time: Option<Seconds>,
    /// Decayed sum of values.
    sum: f64,
    /// Decayed sum of squared values.
    sum_sq: f64,
    /// Decayed total weight.
    weight: f64,
}

impl TimeEma {
    /// Create an EMA with the given half-life in seconds.
    pub fn new(half_life: Seconds) -> Result<Self> {
        check_half_life(half_life)?;
        Ok(Self {
            half_life,
            last_time: None,
            sum: 0.0,
            sum_sq: 0.0,
            weight: 0.0,
        })
    }

    pub fn half_life(&self) -> Seconds {
        self.half_life
    }

    /// Add an observation at time `t` and return the updated mean.
    ///
    /// Time going backwards is treated as no elapsed time.
    pub fn push(&mut self, t: Seconds, value: f64) -> f64 {
        if let Some(prev) = self.last_time {
            let dt = (t - prev).max(0.0);
            let decay = 0.5_f64.powf(dt / self.half_life);
            self.sum *= decay;
            self.sum_sq *= decay;
            self.weight *= decay;
        }
        self.sum += value;
        self.sum_sq += value * value;
        self.weight += 1.0;
        self.last_time = Some(t.max(self.last_time.unwrap_or(t)));
        self.mean()
    }

    /// Current weighted mean, NaN before the first observation.
    pub fn mean(&self) -> f64 {
        if self.weight == 0.0 {
            return f64::NAN;
        }
        self.sum / self.weight
    }

    /// Current weighted second central moment, never negative.
    pub fn variance(&self) -> f64 {
        if self.weight == 0.0 {
            return f64::NAN;
        }
        let mean = self.mean();
        (self.sum_sq / self.weight - mean * mean).max(0.0)
    }

    pub fn is_ready(&self) -> bool {
        self.weight > 0.0
    }
}

pub(crate) fn check_half_life(half_life: Seconds) -> Result<()> {
    if half_life.is_finite() && half_life > 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!(
            "half-life must be positive and finite, got {half_life}"
        )))
    }
}

pub(crate) fn check_lengths(times: &[Seconds], values: &[f64]) -> Result<()> {
    if times.len() == values.len() {
        Ok(())
    } else {
        Err(Error::data(format!(
            "{} timestamps for {} values",
            times.len(),
            values.len()
        )))
    }
}

/// Time-weighted EMA evaluated at every observation.
pub fn ewm_mean(times: &[Seconds], values: &[f64], half_life: Seconds) -> Result<Vec<f64>> {
    check_lengths(times, values)?;
    let mut ema = TimeEma::new(half_life)?;
    Ok(times
        .iter()
        .zip(values)
        .map(|(&t, &x)| ema.push(t, x))
        .collect())
}
