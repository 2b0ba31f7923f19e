//! Momentum scoring: six independent rule categories, summed and clamped
//! to [0, 100], plus a trend label derived from the clamped total.
//!
//! | Category       | Tier (highest wins)                                  | Points |
//! |----------------|------------------------------------------------------|--------|
//! | Trend          | P>EMA20>EMA50>EMA200 / P>EMA50>EMA200 / P>EMA200     | 30/20/10 |
//! | RSI            | 60≤RSI<80 / 50≤RSI<60 or 80≤RSI≤90                   | 20/10  |
//! | MACD           | histogram>0 and line>signal                          | 15     |
//! | Volume         | ratio>1.5 / ratio>1.2                                | 15/10  |
//! | Trend strength | ADX>30 / >25 / >20                                   | 20/15/10 |
//! | DI crossover   | bullish / bearish                                    | +10/-10 |
//!
//! A category whose inputs are undefined scores 0.

use crate::domain::indicator::IndicatorVector;
use serde::Serialize;
use std::fmt;

pub const MAX_SCORE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    TrendAlignment,
    Rsi,
    Macd,
    Volume,
    TrendStrength,
    DiCrossover,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 6] = [
        ScoreCategory::TrendAlignment,
        ScoreCategory::Rsi,
        ScoreCategory::Macd,
        ScoreCategory::Volume,
        ScoreCategory::TrendStrength,
        ScoreCategory::DiCrossover,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScoreCategory::TrendAlignment => "trend_alignment",
            ScoreCategory::Rsi => "rsi",
            ScoreCategory::Macd => "macd",
            ScoreCategory::Volume => "volume",
            ScoreCategory::TrendStrength => "trend_strength",
            ScoreCategory::DiCrossover => "di_crossover",
        }
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub category: ScoreCategory,
    pub points: i32,
    pub condition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TrendLabel {
    NeutralDown,
    WeakUp,
    MediumUp,
    StrongUp,
}

impl TrendLabel {
    pub fn from_score(total: u8) -> Self {
        match total {
            80.. => TrendLabel::StrongUp,
            60.. => TrendLabel::MediumUp,
            40.. => TrendLabel::WeakUp,
            _ => TrendLabel::NeutralDown,
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendLabel::StrongUp => "Strong up",
            TrendLabel::MediumUp => "Medium up",
            TrendLabel::WeakUp => "Weak up",
            TrendLabel::NeutralDown => "Neutral/down",
        };
        f.write_str(s)
    }
}

/// Frozen result of scoring one indicator vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    entries: Vec<ScoreEntry>,
    raw_total: i32,
    total: u8,
    trend: TrendLabel,
}

impl ScoreBreakdown {
    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    /// Sum of category points before clamping.
    pub fn raw_total(&self) -> i32 {
        self.raw_total
    }

    pub fn total(&self) -> u8 {
        self.total
    }

    pub fn trend(&self) -> TrendLabel {
        self.trend
    }

    pub fn points(&self, category: ScoreCategory) -> i32 {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.points)
            .sum()
    }
}

#[derive(Default)]
struct BreakdownBuilder {
    entries: Vec<ScoreEntry>,
}

impl BreakdownBuilder {
    fn push(&mut self, category: ScoreCategory, points: i32, condition: impl Into<String>) {
        self.entries.push(ScoreEntry {
            category,
            points,
            condition: condition.into(),
        });
    }

    fn finish(self) -> ScoreBreakdown {
        let raw_total: i32 = self.entries.iter().map(|e| e.points).sum();
        let total = raw_total.clamp(0, MAX_SCORE) as u8;
        ScoreBreakdown {
            entries: self.entries,
            raw_total,
            total,
            trend: TrendLabel::from_score(total),
        }
    }
}

pub fn score(v: &IndicatorVector) -> ScoreBreakdown {
    let mut b = BreakdownBuilder::default();
    let (points, condition) = trend_alignment(v);
    b.push(ScoreCategory::TrendAlignment, points, condition);
    let (points, condition) = rsi_zone(v.rsi);
    b.push(ScoreCategory::Rsi, points, condition);
    let (points, condition) = macd_momentum(v);
    b.push(ScoreCategory::Macd, points, condition);
    let (points, condition) = volume_surge(v.volume_ratio);
    b.push(ScoreCategory::Volume, points, condition);
    let (points, condition) = trend_strength(v.adx);
    b.push(ScoreCategory::TrendStrength, points, condition);
    let (points, condition) = di_crossover(v);
    b.push(ScoreCategory::DiCrossover, points, condition);
    b.finish()
}

fn trend_alignment(v: &IndicatorVector) -> (i32, String) {
    let p = v.price;
    match (v.ema20, v.ema50, v.ema200) {
        (Some(e20), Some(e50), Some(e200)) if p > e20 && e20 > e50 && e50 > e200 => {
            (30, "price > EMA20 > EMA50 > EMA200".into())
        }
        (_, Some(e50), Some(e200)) if p > e50 && e50 > e200 => {
            (20, "price > EMA50 > EMA200".into())
        }
        (_, _, Some(e200)) if p > e200 => (10, "price > EMA200".into()),
        (_, _, Some(_)) => (0, "price at or below EMA200".into()),
        (_, _, None) => (0, "EMA200 undefined".into()),
    }
}

fn rsi_zone(rsi: Option<f64>) -> (i32, String) {
    match rsi {
        Some(r) if (60.0..80.0).contains(&r) => (20, format!("60 <= RSI {:.1} < 80", r)),
        Some(r) if (50.0..60.0).contains(&r) => (10, format!("50 <= RSI {:.1} < 60", r)),
        Some(r) if (80.0..=90.0).contains(&r) => (10, format!("80 <= RSI {:.1} <= 90", r)),
        Some(r) => (0, format!("RSI {:.1} outside scoring zones", r)),
        None => (0, "RSI undefined".into()),
    }
}

fn macd_momentum(v: &IndicatorVector) -> (i32, String) {
    match (v.macd_histogram, v.macd_line, v.macd_signal) {
        (Some(h), Some(line), Some(signal)) if h > 0.0 && line > signal => {
            (15, "MACD histogram > 0 and line above signal".into())
        }
        (Some(_), Some(_), Some(_)) => (0, "MACD histogram <= 0".into()),
        _ => (0, "MACD undefined".into()),
    }
}

fn volume_surge(ratio: Option<f64>) -> (i32, String) {
    match ratio {
        Some(r) if r > 1.5 => (15, format!("volume ratio {:.2} > 1.5", r)),
        Some(r) if r > 1.2 => (10, format!("volume ratio {:.2} > 1.2", r)),
        Some(r) => (0, format!("volume ratio {:.2} <= 1.2", r)),
        None => (0, "volume ratio undefined".into()),
    }
}

fn trend_strength(adx: Option<f64>) -> (i32, String) {
    match adx {
        Some(a) if a > 30.0 => (20, format!("ADX {:.1} > 30", a)),
        Some(a) if a > 25.0 => (15, format!("ADX {:.1} > 25", a)),
        Some(a) if a > 20.0 => (10, format!("ADX {:.1} > 20", a)),
        Some(a) => (0, format!("ADX {:.1} <= 20", a)),
        None => (0, "ADX undefined".into()),
    }
}

fn di_crossover(v: &IndicatorVector) -> (i32, String) {
    if v.bullish_crossover {
        (10, "+DI crossed above -DI".into())
    } else if v.bearish_crossover {
        (-10, "-DI crossed above +DI".into())
    } else {
        (0, "no DI crossover".into())
    }
}
