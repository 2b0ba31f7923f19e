//! Resilient fetcher: jittered, bounded-retry wrapper around a history provider.
//!
//! Every attempt is preceded by a random delay drawn uniformly from
//! `[jitter_min, jitter_max]`. Retryable provider errors are retried with
//! exponential backoff up to `max_attempts`; permanent errors end the fetch
//! at once.

use crate::domain::error::FetchError;
use crate::domain::ohlcv::{into_series, OhlcvSeries};
use crate::domain::window::FetchWindow;
use crate::ports::history_port::{HistoryProvider, ProviderError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_millis(8000),
            jitter_min: Duration::from_millis(300),
            jitter_max: Duration::from_millis(2000),
        }
    }
}

impl FetchPolicy {
    /// No sleeping at all. Useful for local providers.
    pub fn immediate(max_attempts: u32) -> Self {
        FetchPolicy {
            max_attempts,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff after failed attempt `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.backoff_max)
    }

    pub fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Upper bound on the time spent sleeping across all attempts,
    /// excluding the provider calls themselves.
    /// Saturates at `Duration::MAX`.
    pub fn sleep_ceiling(&self) -> Duration {
        let n = self.attempts();
        // The exponent stops growing after 32 backoffs; the rest are flat.
        let growing = n.saturating_sub(1).min(32);
        let flat = n.saturating_sub(1) - growing;
        let backoffs = (1..=growing)
            .map(|a| self.backoff(a))
            .fold(Duration::ZERO, Duration::saturating_add)
            .saturating_add(self.backoff(32).saturating_mul(flat));
        self.jitter_max
            .max(self.jitter_min)
            .saturating_mul(n)
            .saturating_add(backoffs)
    }
}

pub struct ResilientFetcher {
    provider: Arc<dyn HistoryProvider>,
    policy: FetchPolicy,
}

impl ResilientFetcher {
    pub fn new(provider: Arc<dyn HistoryProvider>, policy: FetchPolicy) -> Self {
        ResilientFetcher { provider, policy }
    }

    pub async fn fetch(
        &self,
        fetch_symbol: &str,
        window: FetchWindow,
    ) -> Result<OhlcvSeries, FetchError> {
        let max_attempts = self.policy.attempts();
        let mut last_error: Option<ProviderError> = None;

        for attempt in 1..=max_attempts {
            let delay = self.policy.jitter();
            debug!(
                fetch_symbol,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "pre-fetch delay"
            );
            tokio::time::sleep(delay).await;

            let err = match self.provider.history(fetch_symbol, window).await {
                Ok(bars) => {
                    debug!(fetch_symbol, attempt, bars = bars.len(), "fetched history");
                    return Ok(into_series(bars));
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!(fetch_symbol, attempt, error = %err, "permanent fetch failure");
                return Err(FetchError {
                    fetch_symbol: fetch_symbol.to_string(),
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }

            if attempt < max_attempts {
                let mut backoff = self.policy.backoff(attempt);
                if let ProviderError::RateLimited {
                    retry_after_ms: Some(ms),
                } = &err
                {
                    backoff = backoff.max(Duration::from_millis(*ms));
                }
                warn!(
                    fetch_symbol,
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "fetch attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            last_error = Some(err);
        }

        let reason = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
        warn!(fetch_symbol, attempts = max_attempts, reason = %reason, "fetch attempts exhausted");
        Err(FetchError {
            fetch_symbol: fetch_symbol.to_string(),
            attempts: max_attempts,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a scripted sequence of results, then repeats the last one.
    struct Scripted {
        calls: AtomicU32,
        script: Mutex<Vec<Result<Vec<OhlcvBar>, ProviderError>>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<Vec<OhlcvBar>, ProviderError>>) -> Arc<Self> {
            Arc::new(Scripted {
                calls: AtomicU32::new(0),
                script: Mutex::new(script),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistoryProvider for Scripted {
        async fn history(
            &self,
            _fetch_symbol: &str,
            _window: FetchWindow,
        ) -> Result<Vec<OhlcvBar>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn bars(n: usize) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0,
                volume: 100.0,
            })
            .collect()
    }

    fn transport() -> Result<Vec<OhlcvBar>, ProviderError> {
        Err(ProviderError::Transport("connection reset".into()))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10), Duration::from_millis(8000));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = FetchPolicy::default();
        for _ in 0..200 {
            let j = policy.jitter();
            assert!(j >= policy.jitter_min && j <= policy.jitter_max);
        }
    }

    #[test]
    fn sleep_ceiling_sums_worst_case() {
        let policy = FetchPolicy::default();
        // 3 * 2000 jitter + 500 + 1000 backoff
        assert_eq!(policy.sleep_ceiling(), Duration::from_millis(7500));
    }

    #[test]
    fn sleep_ceiling_flat_tail_after_cap() {
        let policy = FetchPolicy {
            max_attempts: 40,
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(10),
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        };
        // 1 + 2 + 4 + 8, then 35 backoffs capped at 10
        assert_eq!(policy.sleep_ceiling(), Duration::from_millis(15 + 350));
    }

    #[test]
    fn sleep_ceiling_saturates_instead_of_overflowing() {
        let policy = FetchPolicy {
            max_attempts: u32::MAX,
            backoff_base: Duration::from_millis(u64::MAX),
            backoff_max: Duration::from_millis(u64::MAX),
            jitter_min: Duration::ZERO,
            jitter_max: Duration::from_millis(u64::MAX),
        };
        assert_eq!(policy.sleep_ceiling(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_provider_gets_exactly_max_attempts() {
        let provider = Scripted::new(vec![transport()]);
        let fetcher = ResilientFetcher::new(provider.clone(), FetchPolicy::default());
        let err = fetcher
            .fetch("FAIL.NS", FetchWindow::default())
            .await
            .unwrap_err();
        assert_eq!(provider.calls(), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.fetch_symbol, "FAIL.NS");
        assert!(err.reason.contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let provider = Scripted::new(vec![transport(), Ok(bars(5))]);
        let fetcher = ResilientFetcher::new(provider.clone(), FetchPolicy::default());
        let series = fetcher.fetch("OK", FetchWindow::default()).await.unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let provider = Scripted::new(vec![Err(ProviderError::NotFound("ZZZZ".into()))]);
        let fetcher = ResilientFetcher::new(provider.clone(), FetchPolicy::default());
        let err = fetcher.fetch("ZZZZ", FetchWindow::default()).await.unwrap_err();
        assert_eq!(provider.calls(), 1);
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_jitter_before_first_attempt() {
        let policy = FetchPolicy {
            jitter_min: Duration::from_millis(300),
            jitter_max: Duration::from_millis(300),
            ..FetchPolicy::default()
        };
        let provider = Scripted::new(vec![Ok(bars(3))]);
        let fetcher = ResilientFetcher::new(provider, policy);
        let start = tokio::time::Instant::now();
        fetcher.fetch("X", FetchWindow::default()).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_hint_extends_backoff() {
        let policy = FetchPolicy::immediate(2);
        let provider = Scripted::new(vec![
            Err(ProviderError::RateLimited {
                retry_after_ms: Some(5000),
            }),
            Ok(bars(1)),
        ]);
        let fetcher = ResilientFetcher::new(provider, policy);
        let start = tokio::time::Instant::now();
        fetcher.fetch("X", FetchWindow::default()).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(5100));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let provider = Scripted::new(vec![transport()]);
        let fetcher = ResilientFetcher::new(provider.clone(), FetchPolicy::immediate(0));
        let err = fetcher.fetch("X", FetchWindow::default()).await.unwrap_err();
        assert_eq!(provider.calls(), 1);
        assert_eq!(err.attempts, 1);
    }
}
