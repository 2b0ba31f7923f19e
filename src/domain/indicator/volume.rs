//! Volume ratio: volume / rolling_mean(volume, n).
//!
//! Undefined during the first n-1 bars and wherever the rolling mean is zero.

use crate::domain::indicator::{ratio, rolling_mean, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 20;

pub fn calculate_volume_ratio(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let volumes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.volume)).collect();
    let means = rolling_mean(&volumes, period);
    let raw: Vec<Option<f64>> = bars
        .iter()
        .zip(&means)
        .map(|(bar, mean)| mean.and_then(|m| ratio(bar.volume, m)))
        .collect();
    IndicatorSeries::from_simple(IndicatorType::VolumeRatio(period), bars, &raw)
}
