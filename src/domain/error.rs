//! Domain error types.

use std::process::ExitCode;

/// Top-level error type for the screener.
///
/// Per-symbol failures never surface here; they become a skip at the unit
/// boundary. Only run-level and configuration failures do.
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid input in {source_name}: {reason}")]
    Validation { source_name: String, reason: String },

    #[error("symbol list is empty")]
    EmptyUniverse,

    #[error("none of the {requested} symbols could be resolved to a fetch symbol")]
    NoResolvableSymbols { requested: usize },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("failed to write report {path}: {reason}")]
    Report { path: String, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScreenerError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ScreenerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ScreenerError> for ExitCode {
    fn from(err: &ScreenerError) -> Self {
        let code: u8 = match err {
            ScreenerError::Io(_) | ScreenerError::Csv(_) | ScreenerError::Report { .. } => 1,
            ScreenerError::ConfigParse { .. }
            | ScreenerError::ConfigMissing { .. }
            | ScreenerError::ConfigInvalid { .. } => 2,
            ScreenerError::Validation { .. }
            | ScreenerError::EmptyUniverse
            | ScreenerError::NoResolvableSymbols { .. } => 3,
            ScreenerError::NoData { .. } | ScreenerError::InsufficientData { .. } => 5,
        };
        ExitCode::from(code)
    }
}

/// Terminal failure of the resilient fetcher after its attempts ran out or
/// the provider reported a permanent error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch of {fetch_symbol} failed after {attempts} attempt(s): {reason}")]
pub struct FetchError {
    pub fetch_symbol: String,
    pub attempts: u32,
    pub reason: String,
}
