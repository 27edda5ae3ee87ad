//! Volatility peak segmentation.
//!
//! The EMA variance of the mid price spikes around sharp moves. Peaks of
//! that series above `mean + threshold_std * std` are kept, and the width
//! of each peak near its base bounds the excursion in tick indices.

use crate::ema::{check_lengths, TimeEma};
use drift_core::config::VolatilityConfig;
use drift_core::{Result, Seconds, TickIndex, TickTable, VolatilityPeak};
use statrs::statistics::Statistics;
use tracing::debug;

/// Time-weighted variance `E_w[x²] - E_w[x]²` at every observation.
pub fn ewm_variance(times: &[Seconds], values: &[f64], half_life: Seconds) -> Result<Vec<f64>> {
    check_lengths(times, values)?;
    let mut ema = TimeEma::new(half_life)?;
    Ok(times
        .iter()
        .zip(values)
        .map(|(&t, &x)| {
            ema.push(t, x);
            ema.variance()
        })
        .collect())
}

/// Indices of local maxima.
///
/// A sample is a peak when it is strictly above its left neighbour and
/// above its right neighbour. A flat top counts once, at its middle sample
/// (rounded down). The first and last samples are never peaks. With
/// `min_height`, peaks below it are dropped.
pub fn find_peaks(series: &[f64], min_height: Option<f64>) -> Vec<TickIndex> {
    let n = series.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    while i < n - 1 {
        if series[i - 1] < series[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && series[ahead] == series[i] {
                ahead += 1;
            }
            if series[ahead] < series[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    match min_height {
        Some(h) => peaks.into_iter().filter(|&p| series[p] >= h).collect(),
        None => peaks,
    }
}

/// Prominence of a peak and the bases it was measured from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub prominence: f64,
    pub left_base: TickIndex,
    pub right_base: TickIndex,
}

/// Vertical distance from each peak down to its lowest contour line.
///
/// On each side the walk stops at the first sample higher than the peak or
/// at the series edge; the higher of the two minima found is the contour.
pub fn peak_prominences(series: &[f64], peaks: &[TickIndex]) -> Vec<Prominence> {
    peaks
        .iter()
        .map(|&peak| {
            let height = series[peak];

            let mut left_base = peak;
            let mut left_min = height;
            let mut i = peak;
            loop {
                if series[i] > height {
                    break;
                }
                if series[i] < left_min {
                    left_min = series[i];
                    left_base = i;
                }
                if i == 0 {
                    break;
                }
                i -= 1;
            }

            let mut right_base = peak;
            let mut right_min = height;
            for (j, &x) in series.iter().enumerate().skip(peak) {
                if x > height {
                    break;
                }
                if x < right_min {
                    right_min = x;
                    right_base = j;
                }
            }

            Prominence {
                prominence: height - left_min.max(right_min),
                left_base,
                right_base,
            }
        })
        .collect()
}

/// Width of a peak at a fraction of its prominence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakWidth {
    pub width: f64,
    /// Height of the evaluation line.
    pub width_height: f64,
    pub left_position: f64,
    pub right_position: f64,
    /// First sample at or below the line on the left.
    pub left_index: TickIndex,
    /// First sample at or below the line on the right.
    pub right_index: TickIndex,
}

/// Peak widths at `peak - rel_height * prominence`.
///
/// The walk outwards from the peak stops at the first sample not above
/// the line (or at the base), and the crossing is linearly interpolated.
pub fn peak_widths(
    series: &[f64],
    peaks: &[TickIndex],
    prominences: &[Prominence],
    rel_height: f64,
) -> Vec<PeakWidth> {
    peaks
        .iter()
        .zip(prominences)
        .map(|(&peak, prom)| {
            let line = series[peak] - prom.prominence * rel_height;

            let mut i = peak;
            while prom.left_base < i && line < series[i] {
                i -= 1;
            }
            let left_index = i;
            let mut left_position = i as f64;
            if series[i] < line {
                left_position += (line - series[i]) / (series[i + 1] - series[i]);
            }

            let mut i = peak;
            while i < prom.right_base && line < series[i] {
                i += 1;
            }
            let right_index = i;
            let mut right_position = i as f64;
            if series[i] < line {
                right_position -= (line - series[i]) / (series[i - 1] - series[i]);
            }

            PeakWidth {
                width: right_position - left_position,
                width_height: line,
                left_position,
                right_position,
                left_index,
                right_index,
            }
        })
        .collect()
}

/// Minimum peak height: `mean + threshold_std * std` over the finite values
/// (population std).
pub fn peak_threshold(series: &[f64], threshold_std: f64) -> f64 {
    let finite: Vec<f64> = series.iter().copied().filter(|x| x.is_finite()).collect();
    let mean = finite.iter().mean();
    let std = finite.iter().population_std_dev();
    mean + threshold_std * std
}

/// Significant peaks of the mid-price variance, with their bounds.
pub fn segment(ticks: &TickTable, config: &VolatilityConfig) -> Result<Vec<VolatilityPeak>> {
    let variance = ewm_variance(&ticks.times(), &ticks.mids(), config.half_life)?;

    let all_peaks = find_peaks(&variance, None);
    let threshold = peak_threshold(&variance, config.threshold_std);
    let peaks = find_peaks(&variance, Some(threshold));

    let prominences = peak_prominences(&variance, &peaks);
    let widths = peak_widths(&variance, &peaks, &prominences, config.rel_height);

    let result: Vec<VolatilityPeak> = peaks
        .iter()
        .zip(prominences.iter().zip(&widths))
        .map(|(&peak, (prom, width))| VolatilityPeak {
            peak_index: peak,
            peak_height: variance[peak],
            prominence: prom.prominence,
            left_bound_index: width.left_index,
            right_bound_index: width.right_index,
            left_position: width.left_position,
            right_position: width.right_position,
            width: width.width,
        })
        .collect();

    debug!(
        ticks = ticks.len(),
        local_maxima = all_peaks.len(),
        threshold,
        peaks = result.len(),
        "segmented volatility peaks"
    );
    Ok(result)
}
