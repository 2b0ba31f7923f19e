//! Directional movement: +DI, -DI and ADX.
//!
//! TR[i]  = max(H-L, |H-prevC|, |L-prevC|), TR[0] = H-L
//! +DM[i] = H[i]-H[i-1] when it exceeds L[i-1]-L[i] and is positive, else 0
//! -DM[i] = L[i-1]-L[i] when it exceeds H[i]-H[i-1] and is positive, else 0
//! ±DI    = 100 * rolling_sum(±DM, n) / rolling_mean(TR, n)
//! DX     = 100 * |+DI - -DI| / (+DI + -DI)
//! ADX    = rolling_mean(DX, n)
//!
//! Warmup: ±DI from bar n, ADX from bar 2n-1. A zero TR mean or a zero
//! DI sum leaves the affected values undefined.

use crate::domain::indicator::{
    ratio, rolling_mean, rolling_sum, IndicatorSeries, IndicatorType,
};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct DirectionalSeries {
    pub plus_di: IndicatorSeries,
    pub minus_di: IndicatorSeries,
    pub adx: IndicatorSeries,
}

/// DI crossover state on the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    Bullish,
    Bearish,
    None,
}

pub fn calculate_directional(bars: &[OhlcvBar], period: usize) -> DirectionalSeries {
    let n = bars.len();
    let mut tr: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut plus_dm: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut minus_dm: Vec<Option<f64>> = Vec::with_capacity(n);

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            tr.push(Some(bar.high - bar.low));
            plus_dm.push(None);
            minus_dm.push(None);
            continue;
        }
        let prev = &bars[i - 1];
        tr.push(Some(bar.true_range(prev.close)));

        let up = bar.high - prev.high;
        let down = prev.low - bar.low;
        plus_dm.push(Some(if up > down && up > 0.0 { up } else { 0.0 }));
        minus_dm.push(Some(if down > up && down > 0.0 { down } else { 0.0 }));
    }

    let atr = rolling_mean(&tr, period);
    let plus_sum = rolling_sum(&plus_dm, period);
    let minus_sum = rolling_sum(&minus_dm, period);

    let di = |sums: &[Option<f64>]| -> Vec<Option<f64>> {
        sums.iter()
            .zip(&atr)
            .map(|(s, a)| match (s, a) {
                (Some(s), Some(a)) => ratio(100.0 * s, *a),
                _ => None,
            })
            .collect()
    };
    let plus_di = di(&plus_sum);
    let minus_di = di(&minus_sum);

    let dx: Vec<Option<f64>> = plus_di
        .iter()
        .zip(&minus_di)
        .map(|(p, m)| match (p, m) {
            (Some(p), Some(m)) => ratio(100.0 * (p - m).abs(), p + m),
            _ => None,
        })
        .collect();
    let adx = rolling_mean(&dx, period);

    DirectionalSeries {
        plus_di: IndicatorSeries::from_simple(IndicatorType::PlusDi(period), bars, &plus_di),
        minus_di: IndicatorSeries::from_simple(IndicatorType::MinusDi(period), bars, &minus_di),
        adx: IndicatorSeries::from_simple(IndicatorType::Adx(period), bars, &adx),
    }
}

impl DirectionalSeries {
    /// Crossover on the latest bar. Any undefined input on the latest or
    /// prior bar means no crossover.
    pub fn crossover(&self) -> Crossover {
        let (Some(p_now), Some(m_now), Some(p_prev), Some(m_prev)) = (
            self.plus_di.latest_simple(),
            self.minus_di.latest_simple(),
            self.plus_di.previous_simple(),
            self.minus_di.previous_simple(),
        ) else {
            return Crossover::None;
        };

        if p_now > m_now && p_prev <= m_prev {
            Crossover::Bullish
        } else if m_now > p_now && m_prev <= p_prev {
            Crossover::Bearish
        } else {
            Crossover::None
        }
    }
}
