//! History provider port.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::window::FetchWindow;
use async_trait::async_trait;

/// Failures reported by a history provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Connection failure, timeout, or a 5xx-style provider fault.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    /// The provider has no such symbol.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response arrived but could not be interpreted as OHLCV data.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport(_) | ProviderError::RateLimited { .. }
        )
    }
}

/// Source of daily OHLCV history.
///
/// Bars may come back unsorted or with duplicate dates; callers normalize.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn history(
        &self,
        fetch_symbol: &str,
        window: FetchWindow,
    ) -> Result<Vec<OhlcvBar>, ProviderError>;
}
