//! Screening universe: the input symbol sheet.
//!
//! Headers are matched to canonical names case- and space-insensitively.
//! `Symbol` is required; `Exchange` and a pre-resolved fetch symbol column
//! are recognized; every other column travels with the symbol as metadata.

use crate::domain::error::ScreenerError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const SYMBOL_COLUMN: &str = "Symbol";
pub const EXCHANGE_COLUMN: &str = "Exchange";
pub const FETCH_SYMBOL_COLUMN: &str = "Fetch_Symbol";

/// Canonical metadata columns, in display order.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "Symbol",
    "Name",
    "Sector",
    "Industry",
    "Theme",
    "Country",
    "Notes",
    "Asset_Type",
];

const FETCH_SYMBOL_ALIASES: [&str; 3] = ["fetch_symbol", "yf_symbol", "yahoo_symbol"];

/// Metadata columns that categorical filters understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryField {
    Exchange,
    Sector,
    Industry,
    Country,
    Theme,
    AssetType,
}

impl CategoryField {
    pub const ALL: [CategoryField; 6] = [
        CategoryField::Exchange,
        CategoryField::Sector,
        CategoryField::Industry,
        CategoryField::Country,
        CategoryField::Theme,
        CategoryField::AssetType,
    ];

    pub fn column(self) -> &'static str {
        match self {
            CategoryField::Exchange => EXCHANGE_COLUMN,
            CategoryField::Sector => "Sector",
            CategoryField::Industry => "Industry",
            CategoryField::Country => "Country",
            CategoryField::Theme => "Theme",
            CategoryField::AssetType => "Asset_Type",
        }
    }

    /// Key used for this field in the `[filter]` config section.
    pub fn config_key(self) -> &'static str {
        match self {
            CategoryField::Exchange => "exchange",
            CategoryField::Sector => "sector",
            CategoryField::Industry => "industry",
            CategoryField::Country => "country",
            CategoryField::Theme => "theme",
            CategoryField::AssetType => "asset_type",
        }
    }
}

impl fmt::Display for CategoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Anything carrying categorical metadata a filter can test.
pub trait Categorized {
    fn category(&self, field: CategoryField) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInput {
    pub symbol: String,
    pub exchange: Option<String>,
    pub fetch_symbol: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl SymbolInput {
    pub fn new(symbol: impl Into<String>) -> Self {
        SymbolInput {
            symbol: symbol.into(),
            exchange: None,
            fetch_symbol: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_fetch_symbol(mut self, fetch_symbol: impl Into<String>) -> Self {
        self.fetch_symbol = Some(fetch_symbol.into());
        self
    }

    pub fn with_meta(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(column.into(), value.into());
        self
    }
}

impl Categorized for SymbolInput {
    fn category(&self, field: CategoryField) -> Option<&str> {
        match field {
            CategoryField::Exchange => self.exchange.as_deref(),
            other => self.metadata.get(other.column()).map(String::as_str),
        }
    }
}

/// A parsed input sheet.
#[derive(Debug, Clone, Default)]
pub struct SymbolSheet {
    /// Canonicalized header names, in file order.
    pub columns: Vec<String>,
    pub inputs: Vec<SymbolInput>,
    /// Rows dropped because their symbol was blank after cleaning.
    pub dropped_blank: usize,
}

impl SymbolSheet {
    /// Categorical columns this sheet carries at all.
    pub fn carried_fields(&self) -> BTreeSet<CategoryField> {
        CategoryField::ALL
            .into_iter()
            .filter(|f| self.columns.iter().any(|c| c == f.column()))
            .collect()
    }
}

/// Maps a raw header onto its canonical spelling, or returns it trimmed.
pub fn canonical_column(header: &str) -> String {
    let key = header.trim().to_lowercase();
    if let Some(canon) = CANONICAL_COLUMNS
        .iter()
        .chain(std::iter::once(&EXCHANGE_COLUMN))
        .find(|c| c.to_lowercase() == key)
    {
        return canon.to_string();
    }
    if FETCH_SYMBOL_ALIASES.contains(&key.as_str()) {
        return FETCH_SYMBOL_COLUMN.to_string();
    }
    header.trim().to_string()
}

/// Trims and upper-cases a symbol. Blank and stringified-NaN values yield `None`.
pub fn clean_symbol(raw: &str) -> Option<String> {
    let s = raw.trim().to_uppercase();
    if s.is_empty() || s == "NAN" {
        None
    } else {
        Some(s)
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Builds a sheet from a header row and data records.
///
/// Fails with a validation error when no `Symbol` column is present.
pub fn build_sheet<I>(
    source_name: &str,
    headers: &[String],
    records: I,
) -> Result<SymbolSheet, ScreenerError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let columns: Vec<String> = headers.iter().map(|h| canonical_column(h)).collect();
    let position = |name: &str| columns.iter().position(|c| c == name);

    let symbol_idx = position(SYMBOL_COLUMN).ok_or_else(|| ScreenerError::Validation {
        source_name: source_name.to_string(),
        reason: format!("missing required column '{}'", SYMBOL_COLUMN),
    })?;
    let exchange_idx = position(EXCHANGE_COLUMN);
    let fetch_idx = position(FETCH_SYMBOL_COLUMN);

    let mut inputs = Vec::new();
    let mut dropped_blank = 0;

    for record in records {
        let cell = |idx: usize| record.get(idx).map(String::as_str).unwrap_or("");
        let Some(symbol) = clean_symbol(cell(symbol_idx)) else {
            dropped_blank += 1;
            continue;
        };

        let mut input = SymbolInput::new(symbol);
        input.exchange = exchange_idx.and_then(|i| non_blank(cell(i)));
        input.fetch_symbol = fetch_idx.and_then(|i| non_blank(cell(i)));
        for (i, column) in columns.iter().enumerate() {
            if Some(i) == exchange_idx || Some(i) == fetch_idx || i == symbol_idx {
                continue;
            }
            if let Some(value) = non_blank(cell(i)) {
                input.metadata.insert(column.clone(), value);
            }
        }
        inputs.push(input);
    }

    Ok(SymbolSheet {
        columns,
        inputs,
        dropped_blank,
    })
}

/// Parses a comma-separated symbol list such as `AAPL, msft, RELIANCE`.
pub fn parse_symbol_list(input: &str) -> Result<Vec<SymbolInput>, ScreenerError> {
    let mut inputs = Vec::new();
    for token in input.split(',') {
        let symbol = clean_symbol(token).ok_or_else(|| ScreenerError::Validation {
            source_name: "--symbols".to_string(),
            reason: "empty token in symbol list".to_string(),
        })?;
        inputs.push(SymbolInput::new(symbol));
    }
    Ok(inputs)
}
