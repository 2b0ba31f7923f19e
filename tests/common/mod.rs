#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use momentum_scanner::domain::fetcher::{FetchPolicy, ResilientFetcher};
use momentum_scanner::domain::history_cache::HistoryCache;
pub use momentum_scanner::domain::ohlcv::OhlcvBar;
use momentum_scanner::domain::orchestrator::{Screener, ScreenerSettings};
use momentum_scanner::domain::window::FetchWindow;
use momentum_scanner::ports::clock_port::Clock;
use momentum_scanner::ports::history_port::{HistoryProvider, ProviderError};
use momentum_scanner::ports::resolver_port::PassthroughResolver;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory history provider with per-symbol failure injection and call
/// counting. Unknown symbols are `NotFound`.
pub struct MockHistoryProvider {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, ProviderError>,
    pub delay: Duration,
    calls: Mutex<HashMap<String, u32>>,
}

impl MockHistoryProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_bars(mut self, fetch_symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(fetch_symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, fetch_symbol: &str, error: ProviderError) -> Self {
        self.errors.insert(fetch_symbol.to_string(), error);
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self, fetch_symbol: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(fetch_symbol)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl HistoryProvider for MockHistoryProvider {
    async fn history(
        &self,
        fetch_symbol: &str,
        _window: FetchWindow,
    ) -> Result<Vec<OhlcvBar>, ProviderError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(fetch_symbol.to_string())
            .or_insert(0) += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.errors.get(fetch_symbol) {
            return Err(err.clone());
        }
        self.data
            .get(fetch_symbol)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(fetch_symbol.to_string()))
    }
}

pub struct FakeClock(Mutex<DateTime<Utc>>);

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeClock(Mutex::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap(),
        )))
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` daily bars with closes rising linearly from `from` to `to`, a
/// one-point high/low band and constant volume.
pub fn linear_bars(n: usize, from: f64, to: f64) -> Vec<OhlcvBar> {
    let start = date(2023, 1, 2);
    let step = if n > 1 { (to - from) / (n - 1) as f64 } else { 0.0 };
    (0..n)
        .map(|i| {
            let close = from + step * i as f64;
            OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000.0,
            }
        })
        .collect()
}

/// Screener over `provider` with a pass-through resolver and a fake clock.
pub fn screener(
    provider: Arc<dyn HistoryProvider>,
    policy: FetchPolicy,
    settings: ScreenerSettings,
) -> Screener {
    let clock = FakeClock::new();
    let fetcher = ResilientFetcher::new(provider, policy);
    let cache = Arc::new(HistoryCache::new(
        fetcher,
        clock.clone(),
        chrono::Duration::hours(1),
    ));
    Screener::new(cache, Arc::new(PassthroughResolver), clock, settings)
}

pub fn write_history_csv(dir: &Path, fetch_symbol: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("Date,Open,High,Low,Close,Volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", fetch_symbol)), content).unwrap();
}
