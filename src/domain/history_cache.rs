//! History cache: time-bounded memoization of fetched series.
//!
//! Keyed by (fetch symbol, window). Only successful fetches are stored.
//! Each key owns an async slot lock, so concurrent requests for one key
//! wait on a single provider call instead of issuing their own.

use crate::domain::error::FetchError;
use crate::domain::fetcher::ResilientFetcher;
use crate::domain::ohlcv::OhlcvSeries;
use crate::domain::window::FetchWindow;
use crate::ports::clock_port::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fetch_symbol: String,
    pub window: FetchWindow,
}

#[derive(Debug, Clone)]
struct Entry {
    series: OhlcvSeries,
    fetched_at: DateTime<Utc>,
}

type Slot = Arc<tokio::sync::Mutex<Option<Entry>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub fresh_entries: usize,
    pub expired_entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetch_failures: u64,
}

pub struct HistoryCache {
    fetcher: ResilientFetcher,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_failures: AtomicU64,
}

impl HistoryCache {
    pub fn new(fetcher: ResilientFetcher, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        HistoryCache {
            fetcher,
            clock,
            ttl,
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: CacheKey) -> Slot {
        self.slots().entry(key).or_default().clone()
    }

    fn is_fresh(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.fetched_at < self.ttl
    }

    /// Returns the cached series for the key, fetching it on a miss or
    /// after expiry.
    pub async fn get_or_fetch(
        &self,
        fetch_symbol: &str,
        window: FetchWindow,
    ) -> Result<OhlcvSeries, FetchError> {
        let slot = self.slot(CacheKey {
            fetch_symbol: fetch_symbol.to_string(),
            window,
        });
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_ref() {
            if self.is_fresh(entry, self.clock.now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fetch_symbol, %window, "cache hit");
                return Ok(entry.series.clone());
            }
            debug!(fetch_symbol, %window, "cache entry expired");
            *guard = None;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        match self.fetcher.fetch(fetch_symbol, window).await {
            Ok(series) => {
                *guard = Some(Entry {
                    series: series.clone(),
                    fetched_at: self.clock.now(),
                });
                Ok(series)
            }
            Err(err) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Drops every cached window for `fetch_symbol`. Returns how many keys
    /// were removed.
    pub fn invalidate(&self, fetch_symbol: &str) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| key.fetch_symbol != fetch_symbol);
        before - slots.len()
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            ..CacheStats::default()
        };
        for slot in self.slots().values() {
            match slot.try_lock() {
                Ok(guard) => match guard.as_ref() {
                    Some(entry) if self.is_fresh(entry, now) => stats.fresh_entries += 1,
                    Some(_) => stats.expired_entries += 1,
                    None => {}
                },
                Err(_) => stats.in_flight += 1,
            }
        }
        stats
    }
}
