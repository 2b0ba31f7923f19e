//! History provider over a directory of per-symbol CSV files.
//!
//! Files are named `<fetch_symbol>.csv`. Headers are matched loosely
//! (`Date`, `date`, `Close`, `close`, ...). `date`, `high`, `low` and `close`
//! are required; a missing `open` falls back to the close and a missing
//! `volume` to zero. Rows with a blank or non-numeric price are skipped.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::window::FetchWindow;
use crate::ports::history_port::{HistoryProvider, ProviderError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvHistoryAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: Option<usize>,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase().replace([' ', '-'], "_")
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, ProviderError> {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |candidates: &[&str]| names.iter().position(|n| candidates.contains(&n.as_str()));
        let require = |candidates: &[&str]| {
            find(candidates).ok_or_else(|| {
                ProviderError::Malformed(format!("missing {} column", candidates[0]))
            })
        };
        Ok(Columns {
            date: require(&["date", "datetime", "timestamp"])?,
            open: find(&["open"]),
            high: require(&["high"])?,
            low: require(&["low"])?,
            close: require(&["close", "price"])?,
            volume: find(&["volume", "vol"]),
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_price(record: &csv::StringRecord, idx: usize) -> Option<f64> {
    record
        .get(idx)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parses CSV history text into bars inside `window`, counted back from
/// the latest bar in the file.
pub fn parse_history(content: &str, window: FetchWindow) -> Result<Vec<OhlcvBar>, ProviderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| ProviderError::Malformed(format!("CSV header error: {}", e)))?
        .clone();
    let cols = Columns::locate(&headers)?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record =
            result.map_err(|e| ProviderError::Malformed(format!("CSV parse error: {}", e)))?;
        let raw_date = record.get(cols.date).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| ProviderError::Malformed(format!("invalid date '{}'", raw_date)))?;

        let (Some(high), Some(low), Some(close)) = (
            parse_price(&record, cols.high),
            parse_price(&record, cols.low),
            parse_price(&record, cols.close),
        ) else {
            skipped += 1;
            continue;
        };
        let open = cols
            .open
            .and_then(|i| parse_price(&record, i))
            .unwrap_or(close);
        let volume = cols
            .volume
            .and_then(|i| parse_price(&record, i))
            .unwrap_or(0.0);

        bars.push(OhlcvBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }
    if skipped > 0 {
        debug!(skipped, "skipped rows without prices");
    }

    if let Some(latest) = bars.iter().map(|b| b.date).max() {
        let earliest = latest - chrono::Duration::days(window.days());
        bars.retain(|b| b.date > earliest);
    }
    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

impl CsvHistoryAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, fetch_symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", fetch_symbol))
    }
}

#[async_trait]
impl HistoryProvider for CsvHistoryAdapter {
    async fn history(
        &self,
        fetch_symbol: &str,
        window: FetchWindow,
    ) -> Result<Vec<OhlcvBar>, ProviderError> {
        let path = self.csv_path(fetch_symbol);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(format!(
                    "no history file {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(ProviderError::Transport(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        parse_history(&content, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const BHP: &str = "date,open,high,low,close,volume\n\
        2024-01-15,100.0,110.0,90.0,105.0,50000\n\
        2024-01-17,110.0,120.0,105.0,115.0,55000\n\
        2024-01-16,105.0,115.0,100.0,110.0,60000\n";

    fn setup_test_data() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("BHP.AX.csv"), BHP).unwrap();
        fs::write(
            dir.path().join("AAPL.csv"),
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-03-01 00:00:00-05:00,179.5,180.5,177.4,179.6,179.1,73488000\n",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_and_sorts_history() {
        let dir = setup_test_data();
        let adapter = CsvHistoryAdapter::new(dir.path().to_path_buf());
        let bars = adapter.history("BHP.AX", FetchWindow::default()).await.unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(bars[2].close, 115.0);
        assert_eq!(bars[1].volume, 60000.0);
    }

    #[tokio::test]
    async fn normalizes_vendor_headers() {
        let dir = setup_test_data();
        let adapter = CsvHistoryAdapter::new(dir.path().to_path_buf());
        let bars = adapter.history("AAPL", FetchWindow::default()).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(bars[0].close, 179.6);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = setup_test_data();
        let adapter = CsvHistoryAdapter::new(dir.path().to_path_buf());
        let err = adapter.history("XYZ", FetchWindow::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn window_counts_back_from_latest_bar() {
        let content = "date,high,low,close\n\
            2024-01-01,1,1,1\n\
            2024-03-01,1,1,1\n\
            2024-03-30,1,1,1\n";
        let bars = parse_history(content, "30d".parse().unwrap()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn optional_columns_fall_back() {
        let bars = parse_history("Date,High,Low,Close\n2024-01-02,11,9,10\n", FetchWindow::default())
            .unwrap();
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn rows_without_prices_are_skipped() {
        let content = "date,open,high,low,close,volume\n\
            2024-01-02,1,2,0.5,1.5,10\n\
            2024-01-03,,,,,\n\
            2024-01-04,1,2,0.5,nan,10\n";
        let bars = parse_history(content, FetchWindow::default()).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn missing_required_column_is_malformed() {
        let err = parse_history("date,open,volume\n2024-01-02,1,2\n", FetchWindow::default())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(ref m) if m.contains("high")));
    }

    #[test]
    fn bad_date_is_malformed() {
        let err = parse_history("date,high,low,close\n02/01/2024,1,1,1\n", FetchWindow::default())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
