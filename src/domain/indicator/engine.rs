//! Indicator engine: one OHLCV series in, one fixed indicator vector out.

use crate::domain::indicator::adx::{self, Crossover};
use crate::domain::indicator::{
    calculate_directional, calculate_ema, calculate_macd, calculate_rsi, calculate_volume_ratio,
    defined, macd, rsi, volume, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;
use serde::Serialize;

/// Default minimum history for a valid computation.
pub const DEFAULT_MIN_BARS: usize = 60;

/// Latest-bar snapshot of every indicator the scoring rules read.
///
/// `None` means undefined (warm-up or a zero divisor), never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorVector {
    pub bars: usize,
    pub price: f64,
    pub ema12: Option<f64>,
    pub ema20: Option<f64>,
    pub ema26: Option<f64>,
    pub ema50: Option<f64>,
    pub ema200: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub adx: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub bullish_crossover: bool,
    pub bearish_crossover: bool,
}

/// Computes the indicator vector, or `None` when the series is shorter
/// than `min_bars` or its latest close is not a finite number.
pub fn compute(bars: &[OhlcvBar], min_bars: usize) -> Option<IndicatorVector> {
    if bars.len() < min_bars.max(2) {
        return None;
    }
    let price = defined(bars.last()?.close)?;

    let ema = |period| calculate_ema(bars, period).latest_simple();

    let (macd_line, macd_signal, macd_histogram) = match calculate_macd(
        bars,
        macd::DEFAULT_FAST,
        macd::DEFAULT_SLOW,
        macd::DEFAULT_SIGNAL,
    )
    .latest()
    {
        Some(IndicatorValue::Macd {
            line,
            signal,
            histogram,
        }) => (Some(line), Some(signal), defined(histogram)),
        _ => (None, None, None),
    };

    let directional = calculate_directional(bars, adx::DEFAULT_PERIOD);
    let crossover = directional.crossover();

    Some(IndicatorVector {
        bars: bars.len(),
        price,
        ema12: ema(12),
        ema20: ema(20),
        ema26: ema(26),
        ema50: ema(50),
        ema200: ema(200),
        rsi: calculate_rsi(bars, rsi::DEFAULT_PERIOD).latest_simple(),
        macd_line,
        macd_signal,
        macd_histogram,
        plus_di: directional.plus_di.latest_simple(),
        minus_di: directional.minus_di.latest_simple(),
        adx: directional.adx.latest_simple(),
        volume_ratio: calculate_volume_ratio(bars, volume::DEFAULT_PERIOD).latest_simple(),
        bullish_crossover: crossover == Crossover::Bullish,
        bearish_crossover: crossover == Crossover::Bearish,
    })
}
