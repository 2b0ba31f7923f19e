//! Row assembly and the result table.
//!
//! A [`ResultRow`] is built once per successfully analyzed symbol and never
//! mutated afterwards. The [`ResultTable`] keeps rows in insertion order
//! (completion order under concurrency) until [`ResultTable::rank_by_score`]
//! is called explicitly.

use crate::domain::indicator::{self, IndicatorVector};
use crate::domain::ohlcv::{closes, OhlcvBar};
use crate::domain::scoring::{self, ScoreBreakdown, ScoreCategory, TrendLabel};
use crate::domain::universe::{
    Categorized, CategoryField, SymbolInput, EXCHANGE_COLUMN, FETCH_SYMBOL_COLUMN, SYMBOL_COLUMN,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const SHORT_CHANGE_BARS: usize = 5;
pub const LONG_CHANGE_BARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub symbol: String,
    pub fetch_symbol: String,
    pub exchange: Option<String>,
    pub last_price: f64,
    pub change_5d: Option<f64>,
    pub change_20d: Option<f64>,
    pub indicators: IndicatorVector,
    pub breakdown: ScoreBreakdown,
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl ResultRow {
    pub fn score(&self) -> u8 {
        self.breakdown.total()
    }

    pub fn trend(&self) -> TrendLabel {
        self.breakdown.trend()
    }
}

impl Categorized for ResultRow {
    fn category(&self, field: CategoryField) -> Option<&str> {
        match field {
            CategoryField::Exchange => self.exchange.as_deref(),
            other => self.metadata.get(other.column()).map(String::as_str),
        }
    }
}

/// Percent change over the last `k` bars: `(close[n-1] / close[n-k] - 1) * 100`.
///
/// `None` when fewer than `k` closes exist or the base close is zero.
pub fn pct_change(closes: &[f64], k: usize) -> Option<f64> {
    let n = closes.len();
    if k < 2 || n < k {
        return None;
    }
    let base = closes[n - k];
    let last = closes[n - 1];
    indicator::ratio(last, base).map(|r| (r - 1.0) * 100.0)
}

/// Runs the indicator engine and the scoring engine over one series.
pub fn analyze(series: &[OhlcvBar], min_bars: usize) -> Option<(IndicatorVector, ScoreBreakdown)> {
    let vector = indicator::compute(series, min_bars)?;
    let breakdown = scoring::score(&vector);
    Some((vector, breakdown))
}

/// Builds the output row for one symbol. Returns `None` only when the
/// indicator engine produced nothing for the series.
pub fn assemble(
    input: &SymbolInput,
    fetch_symbol: &str,
    series: &[OhlcvBar],
    analysis: Option<(IndicatorVector, ScoreBreakdown)>,
    timestamp: DateTime<Utc>,
) -> Option<ResultRow> {
    let (indicators, breakdown) = analysis?;
    let closes = closes(series);
    Some(ResultRow {
        symbol: input.symbol.clone(),
        fetch_symbol: fetch_symbol.to_string(),
        exchange: input.exchange.clone(),
        last_price: indicators.price,
        change_5d: pct_change(&closes, SHORT_CHANGE_BARS),
        change_20d: pct_change(&closes, LONG_CHANGE_BARS),
        indicators,
        breakdown,
        metadata: input.metadata.clone(),
        timestamp,
    })
}

/// One cell of a flat record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Flag(bool),
    Missing,
}

impl FieldValue {
    fn number(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Missing, FieldValue::Number)
    }

    fn text(value: Option<&str>) -> Self {
        value.map_or(FieldValue::Missing, |s| FieldValue::Text(s.to_string()))
    }

    /// Rendering for delimited text output. Missing values are empty.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => format!("{:.4}", n),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Missing => String::new(),
        }
    }
}

/// Fixed leading columns of every flat record.
pub const FIXED_COLUMNS: [&str; 31] = [
    SYMBOL_COLUMN,
    FETCH_SYMBOL_COLUMN,
    EXCHANGE_COLUMN,
    "Last_Price",
    "Change_5D",
    "Change_20D",
    "EMA12",
    "EMA20",
    "EMA26",
    "EMA50",
    "EMA200",
    "RSI",
    "MACD_Line",
    "MACD_Signal",
    "MACD_Hist",
    "Plus_DI",
    "Minus_DI",
    "ADX",
    "Volume_Ratio",
    "Bullish_Crossover",
    "Bearish_Crossover",
    "Momentum_Score",
    "Raw_Score",
    "Trend",
    "EMA_Points",
    "RSI_Points",
    "MACD_Points",
    "Volume_Points",
    "ADX_Points",
    "DI_Points",
    "Timestamp",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
    metadata_columns: Vec<String>,
    carried: BTreeSet<CategoryField>,
}

impl ResultTable {
    /// `metadata_columns` are the passthrough columns of the input sheet,
    /// `carried` the categorical fields that sheet has at all.
    pub fn new(metadata_columns: Vec<String>, carried: BTreeSet<CategoryField>) -> Self {
        ResultTable {
            rows: Vec::new(),
            metadata_columns,
            carried,
        }
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn carries(&self, field: CategoryField) -> bool {
        self.carried.contains(&field)
    }

    /// Same schema, different rows.
    pub fn with_rows(&self, rows: Vec<ResultRow>) -> Self {
        ResultTable {
            rows,
            metadata_columns: self.metadata_columns.clone(),
            carried: self.carried.clone(),
        }
    }

    /// Stable sort by total score, highest first.
    pub fn rank_by_score(&mut self) {
        self.rows.sort_by(|a, b| b.score().cmp(&a.score()));
    }

    pub fn top(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    pub fn header(&self) -> Vec<String> {
        FIXED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.metadata_columns.iter().cloned())
            .collect()
    }

    /// Rows as flat records aligned with [`ResultTable::header`].
    pub fn records(&self) -> Vec<Vec<FieldValue>> {
        self.rows.iter().map(|row| self.record(row)).collect()
    }

    fn record(&self, row: &ResultRow) -> Vec<FieldValue> {
        let v = &row.indicators;
        let b = &row.breakdown;
        let points = |c: ScoreCategory| FieldValue::Integer(i64::from(b.points(c)));
        let mut record = vec![
            FieldValue::Text(row.symbol.clone()),
            FieldValue::Text(row.fetch_symbol.clone()),
            FieldValue::text(row.exchange.as_deref()),
            FieldValue::Number(row.last_price),
            FieldValue::number(row.change_5d),
            FieldValue::number(row.change_20d),
            FieldValue::number(v.ema12),
            FieldValue::number(v.ema20),
            FieldValue::number(v.ema26),
            FieldValue::number(v.ema50),
            FieldValue::number(v.ema200),
            FieldValue::number(v.rsi),
            FieldValue::number(v.macd_line),
            FieldValue::number(v.macd_signal),
            FieldValue::number(v.macd_histogram),
            FieldValue::number(v.plus_di),
            FieldValue::number(v.minus_di),
            FieldValue::number(v.adx),
            FieldValue::number(v.volume_ratio),
            FieldValue::Flag(v.bullish_crossover),
            FieldValue::Flag(v.bearish_crossover),
            FieldValue::Integer(i64::from(b.total())),
            FieldValue::Integer(i64::from(b.raw_total())),
            FieldValue::Text(b.trend().to_string()),
            points(ScoreCategory::TrendAlignment),
            points(ScoreCategory::Rsi),
            points(ScoreCategory::Macd),
            points(ScoreCategory::Volume),
            points(ScoreCategory::TrendStrength),
            points(ScoreCategory::DiCrossover),
            FieldValue::Text(row.timestamp.to_rfc3339()),
        ];
        record.extend(
            self.metadata_columns
                .iter()
                .map(|c| FieldValue::text(row.metadata.get(c).map(String::as_str))),
        );
        record
    }
}
