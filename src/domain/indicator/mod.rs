//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Indicator name and parameters, used for display
//! - `IndicatorSeries`: A time series of indicator values
//!
//! A point whose value is `None` is undefined (warm-up or a zero divisor).
//! Undefined is never represented as zero.

pub mod adx;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;
pub mod volume;

pub use adx::{calculate_directional, DirectionalSeries};
pub use ema::{calculate_ema, ema_values};
pub use engine::{compute, IndicatorVector, DEFAULT_MIN_BARS};
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use volume::calculate_volume_ratio;

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<IndicatorValue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    PlusDi(usize),
    MinusDi(usize),
    Adx(usize),
    VolumeRatio(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Builds a simple-valued series aligned with `bars`.
    /// Non-finite raw values are stored as undefined.
    pub fn from_simple(
        indicator_type: IndicatorType,
        bars: &[OhlcvBar],
        raw: &[Option<f64>],
    ) -> Self {
        let values = bars
            .iter()
            .zip(raw)
            .map(|(bar, v)| IndicatorPoint {
                date: bar.date,
                value: v.and_then(defined).map(IndicatorValue::Simple),
            })
            .collect();
        Self {
            indicator_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> Option<IndicatorValue> {
        self.values.last().and_then(|p| p.value)
    }

    /// Simple value at `index`, `None` when out of range, undefined or not simple.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index).and_then(|p| p.value) {
            Some(IndicatorValue::Simple(v)) => Some(v),
            _ => None,
        }
    }

    pub fn latest_simple(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.simple_at(i))
    }

    /// Simple value one bar before the latest.
    pub fn previous_simple(&self) -> Option<f64> {
        self.values.len().checked_sub(2).and_then(|i| self.simple_at(i))
    }

    pub fn count_defined(&self) -> usize {
        self.values.iter().filter(|p| p.value.is_some()).count()
    }
}

/// `Some(v)` when `v` is finite.
pub fn defined(v: f64) -> Option<f64> {
    if v.is_finite() { Some(v) } else { None }
}

/// `numerator / denominator`, undefined when the denominator is zero or
/// the result is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        defined(numerator / denominator)
    }
}

/// Rolling mean over `period` values; a window containing any undefined
/// value is itself undefined.
pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_sum(values, period)
        .into_iter()
        .map(|s| s.map(|s| s / period as f64))
        .collect()
}

/// Rolling sum over `period` values with the same undefined rule as
/// [`rolling_mean`].
pub fn rolling_sum(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            values[i + 1 - period..=i]
                .iter()
                .try_fold(0.0, |acc, v| v.map(|v| acc + v))
        })
        .collect()
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::PlusDi(period) => write!(f, "+DI({})", period),
            IndicatorType::MinusDi(period) => write!(f, "-DI({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::VolumeRatio(period) => write!(f, "VOLUME_RATIO({})", period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_ema() {
        assert_eq!(IndicatorType::Ema(20).to_string(), "EMA(20)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_directional() {
        assert_eq!(IndicatorType::PlusDi(14).to_string(), "+DI(14)");
        assert_eq!(IndicatorType::MinusDi(14).to_string(), "-DI(14)");
        assert_eq!(IndicatorType::Adx(14).to_string(), "ADX(14)");
    }

    #[test]
    fn ratio_zero_denominator_is_undefined() {
        assert_eq!(ratio(1.0, 0.0), None);
        assert_eq!(ratio(0.0, 0.0), None);
        assert_eq!(ratio(3.0, 2.0), Some(1.5));
    }

    #[test]
    fn defined_rejects_non_finite() {
        assert_eq!(defined(f64::NAN), None);
        assert_eq!(defined(f64::INFINITY), None);
        assert_eq!(defined(0.0), Some(0.0));
    }

    #[test]
    fn rolling_sum_warmup_and_gaps() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0), Some(6.0)];
        let sums = rolling_sum(&values, 2);
        assert_eq!(
            sums,
            vec![None, Some(3.0), Some(5.0), None, None, Some(11.0)]
        );
    }

    #[test]
    fn rolling_mean_divides_by_period() {
        let values = vec![Some(2.0), Some(4.0), Some(6.0)];
        assert_eq!(rolling_mean(&values, 3), vec![None, None, Some(4.0)]);
        assert_eq!(rolling_mean(&values, 0), vec![None, None, None]);
    }

    #[test]
    fn series_latest_and_previous() {
        let bars: Vec<OhlcvBar> = (1..=3)
            .map(|d| OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .collect();
        let series = IndicatorSeries::from_simple(
            IndicatorType::Rsi(14),
            &bars,
            &[None, Some(f64::NAN), Some(42.0)],
        );
        assert_eq!(series.latest_simple(), Some(42.0));
        assert_eq!(series.previous_simple(), None);
        assert_eq!(series.count_defined(), 1);
    }
}
