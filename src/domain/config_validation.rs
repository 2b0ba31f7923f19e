//! Configuration validation.
//!
//! Each section is read through [`ConfigPort`] into its typed form; a value
//! that is present but malformed or out of range is a `ConfigInvalid` error,
//! an absent value takes its default.

use crate::domain::error::ScreenerError;
use crate::domain::fetcher::FetchPolicy;
use crate::domain::filter::{FilterCriteria, DEFAULT_MIN_SCORE};
use crate::domain::history_cache::DEFAULT_TTL_SECS;
use crate::domain::indicator::DEFAULT_MIN_BARS;
use crate::domain::orchestrator::{ScreenerSettings, DEFAULT_SYMBOL_TIMEOUT_SECS, DEFAULT_WORKERS};
use crate::domain::universe::CategoryField;
use crate::domain::window::FetchWindow;
use crate::ports::config_port::ConfigPort;
use std::time::Duration;

pub const SCREENER: &str = "screener";
pub const FETCH: &str = "fetch";
pub const CACHE: &str = "cache";
pub const FILTER: &str = "filter";
pub const DATA: &str = "data";

/// Validates every section. Used by `check-config`.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    let policy = fetch_policy(config)?;
    let settings = screener_settings(config)?;
    validate_timeout(&settings, &policy)?;
    cache_ttl(config)?;
    filter_criteria(config)?;
    Ok(())
}

fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, ScreenerError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            ScreenerError::config_invalid(section, key, format!("'{}' is not an integer", raw))
        }),
    }
}

fn non_negative_ms(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u64,
) -> Result<Duration, ScreenerError> {
    let value = int_value(config, section, key, default as i64)?;
    if value < 0 {
        return Err(ScreenerError::config_invalid(
            section,
            key,
            format!("{} must be non-negative", key),
        ));
    }
    Ok(Duration::from_millis(value as u64))
}

pub fn screener_settings(config: &dyn ConfigPort) -> Result<ScreenerSettings, ScreenerError> {
    let workers = int_value(config, SCREENER, "workers", DEFAULT_WORKERS as i64)?;
    if workers <= 0 {
        return Err(ScreenerError::config_invalid(
            SCREENER,
            "workers",
            "workers must be positive",
        ));
    }

    let window = match config.get_string(SCREENER, "window") {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<FetchWindow>()
            .map_err(|e| ScreenerError::config_invalid(SCREENER, "window", e.to_string()))?,
        _ => FetchWindow::default(),
    };

    let min_bars = int_value(config, SCREENER, "min_bars", DEFAULT_MIN_BARS as i64)?;
    if min_bars < 2 {
        return Err(ScreenerError::config_invalid(
            SCREENER,
            "min_bars",
            "min_bars must be at least 2",
        ));
    }

    let timeout = int_value(
        config,
        SCREENER,
        "symbol_timeout_secs",
        DEFAULT_SYMBOL_TIMEOUT_SECS as i64,
    )?;
    if timeout <= 0 {
        return Err(ScreenerError::config_invalid(
            SCREENER,
            "symbol_timeout_secs",
            "symbol_timeout_secs must be positive",
        ));
    }

    Ok(ScreenerSettings {
        workers: workers as usize,
        window,
        min_bars: min_bars as usize,
        symbol_timeout: Duration::from_secs(timeout as u64),
    })
}

pub const MAX_FETCH_ATTEMPTS: u32 = 20;

pub fn fetch_policy(config: &dyn ConfigPort) -> Result<FetchPolicy, ScreenerError> {
    let defaults = FetchPolicy::default();

    let max_attempts = int_value(
        config,
        FETCH,
        "max_attempts",
        i64::from(defaults.max_attempts),
    )?;
    if !(1..=i64::from(MAX_FETCH_ATTEMPTS)).contains(&max_attempts) {
        return Err(ScreenerError::config_invalid(
            FETCH,
            "max_attempts",
            format!("max_attempts must be between 1 and {}", MAX_FETCH_ATTEMPTS),
        ));
    }

    let ms = |d: Duration| d.as_millis() as u64;
    let backoff_base = non_negative_ms(config, FETCH, "backoff_base_ms", ms(defaults.backoff_base))?;
    let backoff_max = non_negative_ms(config, FETCH, "backoff_max_ms", ms(defaults.backoff_max))?;
    if backoff_max < backoff_base {
        return Err(ScreenerError::config_invalid(
            FETCH,
            "backoff_max_ms",
            "backoff_max_ms must not be below backoff_base_ms",
        ));
    }

    let jitter_min = non_negative_ms(config, FETCH, "jitter_min_ms", ms(defaults.jitter_min))?;
    let jitter_max = non_negative_ms(config, FETCH, "jitter_max_ms", ms(defaults.jitter_max))?;
    if jitter_max < jitter_min {
        return Err(ScreenerError::config_invalid(
            FETCH,
            "jitter_max_ms",
            "jitter_max_ms must not be below jitter_min_ms",
        ));
    }

    Ok(FetchPolicy {
        max_attempts: max_attempts as u32,
        backoff_base,
        backoff_max,
        jitter_min,
        jitter_max,
    })
}

/// The per-symbol timeout must leave room for every retry sleep.
pub fn validate_timeout(
    settings: &ScreenerSettings,
    policy: &FetchPolicy,
) -> Result<(), ScreenerError> {
    let ceiling = policy.sleep_ceiling();
    if settings.symbol_timeout <= ceiling {
        return Err(ScreenerError::config_invalid(
            SCREENER,
            "symbol_timeout_secs",
            format!(
                "symbol_timeout_secs must exceed the worst-case retry sleep of {} ms",
                ceiling.as_millis()
            ),
        ));
    }
    Ok(())
}

pub fn cache_ttl(config: &dyn ConfigPort) -> Result<chrono::Duration, ScreenerError> {
    let secs = int_value(config, CACHE, "ttl_secs", DEFAULT_TTL_SECS)?;
    if secs < 0 {
        return Err(ScreenerError::config_invalid(
            CACHE,
            "ttl_secs",
            "ttl_secs must be non-negative",
        ));
    }
    chrono::Duration::try_seconds(secs)
        .ok_or_else(|| ScreenerError::config_invalid(CACHE, "ttl_secs", "ttl_secs is too large"))
}

pub fn filter_criteria(config: &dyn ConfigPort) -> Result<FilterCriteria, ScreenerError> {
    let min_score = int_value(config, FILTER, "min_score", i64::from(DEFAULT_MIN_SCORE))?;
    if !(0..=100).contains(&min_score) {
        return Err(ScreenerError::config_invalid(
            FILTER,
            "min_score",
            "min_score must be between 0 and 100",
        ));
    }
    let mut criteria = FilterCriteria::new(min_score as u8);
    for field in CategoryField::ALL {
        criteria = criteria.allow(field, config.get_list(FILTER, field.config_key()));
    }
    Ok(criteria)
}
