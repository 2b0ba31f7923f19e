//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Every bar is defined; there is no warm-up region.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let raw: Vec<Option<f64>> = ema_values(&closes, period).into_iter().map(Some).collect();
    IndicatorSeries::from_simple(IndicatorType::Ema(period), bars, &raw)
}

/// Raw EMA over an arbitrary input, seeded with `values[0]`.
pub fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut iter = values.iter();
    let Some(&first) = iter.next() else {
        return out;
    };
    let mut ema = first;
    out.push(ema);
    for &v in iter {
        ema = v * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}
