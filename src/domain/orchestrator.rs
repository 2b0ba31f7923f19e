//! Orchestrator: fans the per-symbol fetch, compute and assemble units out
//! over a bounded worker pool and collects their outcomes.
//!
//! Units report back over a channel; only the collecting task touches the
//! result table and the counters. Cancellation stops scheduling new units
//! while in-flight units run to completion or time out.

use crate::domain::error::ScreenerError;
use crate::domain::history_cache::HistoryCache;
use crate::domain::indicator::DEFAULT_MIN_BARS;
use crate::domain::row::{analyze, assemble, ResultRow, ResultTable};
use crate::domain::universe::{CategoryField, SymbolInput, SymbolSheet};
use crate::domain::window::FetchWindow;
use crate::ports::clock_port::Clock;
use crate::ports::resolver_port::SymbolResolver;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, info, warn};

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_SYMBOL_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenerSettings {
    pub workers: usize,
    pub window: FetchWindow,
    pub min_bars: usize,
    pub symbol_timeout: Duration,
}

impl Default for ScreenerSettings {
    fn default() -> Self {
        ScreenerSettings {
            workers: DEFAULT_WORKERS,
            window: FetchWindow::default(),
            min_bars: DEFAULT_MIN_BARS,
            symbol_timeout: Duration::from_secs(DEFAULT_SYMBOL_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientData { bars: usize },
    FetchFailure { reason: String },
    Unresolved,
    TimedOut,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InsufficientData { bars } => {
                write!(f, "insufficient data ({} bars)", bars)
            }
            SkipReason::FetchFailure { reason } => write!(f, "fetch failure: {}", reason),
            SkipReason::Unresolved => write!(f, "no fetch symbol"),
            SkipReason::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub fetch_symbol: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Row(Box<ResultRow>),
    Skipped(SkippedSymbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub skipped_insufficient: usize,
    pub skipped_fetch_failure: usize,
    pub skipped_unresolved: usize,
    /// Symbols never scheduled because the run was cancelled.
    pub not_scheduled: usize,
}

impl RunSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_insufficient + self.skipped_fetch_failure + self.skipped_unresolved
    }

    /// A timed-out symbol counts as a fetch failure; the skip list keeps
    /// the distinct reason.
    fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::InsufficientData { .. } => self.skipped_insufficient += 1,
            SkipReason::FetchFailure { .. } | SkipReason::TimedOut => {
                self.skipped_fetch_failure += 1
            }
            SkipReason::Unresolved => self.skipped_unresolved += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requested {}, succeeded {}, insufficient data {}, fetch failures {}, unresolved {}",
            self.requested,
            self.succeeded,
            self.skipped_insufficient,
            self.skipped_fetch_failure,
            self.skipped_unresolved
        )?;
        if self.not_scheduled > 0 {
            write!(f, ", not scheduled {}", self.not_scheduled)?;
        }
        Ok(())
    }
}

/// Symbols plus the schema of the sheet they came from.
#[derive(Debug, Clone, Default)]
pub struct ScreenRequest {
    pub inputs: Vec<SymbolInput>,
    pub metadata_columns: Vec<String>,
    pub carried: BTreeSet<CategoryField>,
}

impl ScreenRequest {
    /// Builds a request from inline inputs. The schema is whatever the
    /// inputs themselves carry: exchange hints and metadata columns.
    pub fn from_inputs(inputs: Vec<SymbolInput>) -> Self {
        let mut metadata_columns: Vec<String> = Vec::new();
        for column in inputs.iter().flat_map(|i| i.metadata.keys()) {
            if !is_identity_column(column) && !metadata_columns.contains(column) {
                metadata_columns.push(column.clone());
            }
        }
        let carried = CategoryField::ALL
            .into_iter()
            .filter(|field| match field {
                CategoryField::Exchange => inputs.iter().any(|i| i.exchange.is_some()),
                other => metadata_columns.iter().any(|c| c == other.column()),
            })
            .collect();
        ScreenRequest {
            inputs,
            metadata_columns,
            carried,
        }
    }
}

impl From<SymbolSheet> for ScreenRequest {
    fn from(sheet: SymbolSheet) -> Self {
        let carried = sheet.carried_fields();
        let metadata_columns = sheet
            .columns
            .iter()
            .filter(|c| !is_identity_column(c))
            .cloned()
            .collect();
        ScreenRequest {
            inputs: sheet.inputs,
            metadata_columns,
            carried,
        }
    }
}

fn is_identity_column(column: &str) -> bool {
    use crate::domain::universe::{EXCHANGE_COLUMN, FETCH_SYMBOL_COLUMN, SYMBOL_COLUMN};
    column == SYMBOL_COLUMN || column == EXCHANGE_COLUMN || column == FETCH_SYMBOL_COLUMN
}

#[derive(Debug, Clone)]
pub struct ScreenRun {
    pub table: ResultTable,
    pub skipped: Vec<SkippedSymbol>,
    pub summary: RunSummary,
    pub cancelled: bool,
}

/// Everything a unit of work needs, cheap to clone into a task.
#[derive(Clone)]
struct UnitContext {
    cache: Arc<HistoryCache>,
    clock: Arc<dyn Clock>,
    window: FetchWindow,
    min_bars: usize,
    timeout: Duration,
}

impl UnitContext {
    async fn process(&self, input: SymbolInput, fetch_symbol: String) -> UnitOutcome {
        match tokio::time::timeout(self.timeout, self.evaluate(&input, &fetch_symbol)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    symbol = %input.symbol,
                    %fetch_symbol,
                    timeout_secs = self.timeout.as_secs(),
                    "symbol timed out"
                );
                skipped(&input, Some(fetch_symbol), SkipReason::TimedOut)
            }
        }
    }

    async fn evaluate(&self, input: &SymbolInput, fetch_symbol: &str) -> UnitOutcome {
        let series = match self.cache.get_or_fetch(fetch_symbol, self.window).await {
            Ok(series) => series,
            Err(err) => {
                return skipped(
                    input,
                    Some(fetch_symbol.to_string()),
                    SkipReason::FetchFailure {
                        reason: err.to_string(),
                    },
                );
            }
        };
        let analysis = analyze(&series, self.min_bars);
        match assemble(input, fetch_symbol, &series, analysis, self.clock.now()) {
            Some(row) => UnitOutcome::Row(Box::new(row)),
            None => skipped(
                input,
                Some(fetch_symbol.to_string()),
                SkipReason::InsufficientData { bars: series.len() },
            ),
        }
    }
}

fn skipped(input: &SymbolInput, fetch_symbol: Option<String>, reason: SkipReason) -> UnitOutcome {
    UnitOutcome::Skipped(SkippedSymbol {
        symbol: input.symbol.clone(),
        fetch_symbol,
        reason,
    })
}

/// Resolves once the cancel flag is set. A dropped sender never cancels.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        let set = *rx.borrow_and_update();
        if set {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct Screener {
    cache: Arc<HistoryCache>,
    resolver: Arc<dyn SymbolResolver>,
    clock: Arc<dyn Clock>,
    settings: ScreenerSettings,
}

impl Screener {
    pub fn new(
        cache: Arc<HistoryCache>,
        resolver: Arc<dyn SymbolResolver>,
        clock: Arc<dyn Clock>,
        settings: ScreenerSettings,
    ) -> Self {
        Screener {
            cache,
            resolver,
            clock,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<HistoryCache> {
        &self.cache
    }

    pub fn settings(&self) -> &ScreenerSettings {
        &self.settings
    }

    fn context(&self) -> UnitContext {
        UnitContext {
            cache: Arc::clone(&self.cache),
            clock: Arc::clone(&self.clock),
            window: self.settings.window,
            min_bars: self.settings.min_bars,
            timeout: self.settings.symbol_timeout,
        }
    }

    /// Analyzes a single symbol without the worker pool.
    pub async fn inspect(&self, input: &SymbolInput) -> Result<UnitOutcome, ScreenerError> {
        let fetch_symbol = self
            .resolver
            .resolve(input)
            .ok_or(ScreenerError::NoResolvableSymbols { requested: 1 })?;
        Ok(self.context().process(input.clone(), fetch_symbol).await)
    }

    /// Screens every symbol in `request`.
    ///
    /// Fails only when the request is empty or no symbol resolves; every
    /// per-symbol failure becomes a skip in the returned run.
    pub async fn run<F>(
        &self,
        request: ScreenRequest,
        mut cancel: watch::Receiver<bool>,
        mut on_progress: F,
    ) -> Result<ScreenRun, ScreenerError>
    where
        F: FnMut(Progress),
    {
        let requested = request.inputs.len();
        if requested == 0 {
            return Err(ScreenerError::EmptyUniverse);
        }

        let mut summary = RunSummary {
            requested,
            ..RunSummary::default()
        };
        let mut skipped_symbols = Vec::new();
        let mut work = Vec::with_capacity(requested);
        for input in request.inputs {
            match self.resolver.resolve(&input) {
                Some(fetch_symbol) => work.push((input, fetch_symbol)),
                None => {
                    warn!(symbol = %input.symbol, "could not resolve fetch symbol");
                    summary.record(&SkipReason::Unresolved);
                    skipped_symbols.push(SkippedSymbol {
                        symbol: input.symbol,
                        fetch_symbol: None,
                        reason: SkipReason::Unresolved,
                    });
                }
            }
        }
        if work.is_empty() {
            return Err(ScreenerError::NoResolvableSymbols { requested });
        }

        let workers = self.settings.workers.max(1);
        let resolved = work.len();
        info!(
            requested,
            resolved,
            workers,
            window = %self.settings.window,
            "starting screen"
        );

        let mut completed = skipped_symbols.len();
        on_progress(Progress {
            completed,
            total: requested,
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<UnitOutcome>();
        let semaphore = Arc::new(Semaphore::new(workers));
        let ctx = self.context();
        let scheduler = tokio::spawn(async move {
            let mut scheduled = 0usize;
            for (input, fetch_symbol) in work {
                let permit = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                scheduled += 1;
                debug!(symbol = %input.symbol, %fetch_symbol, "scheduling unit");
                let tx = tx.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let outcome = ctx.process(input, fetch_symbol).await;
                    drop(permit);
                    let _ = tx.send(outcome);
                });
            }
            scheduled
        });

        let mut table = ResultTable::new(request.metadata_columns, request.carried);
        let mut drained = 0usize;
        while let Some(outcome) = rx.recv().await {
            drained += 1;
            match outcome {
                UnitOutcome::Row(row) => {
                    debug!(symbol = %row.symbol, score = row.score(), "unit succeeded");
                    summary.succeeded += 1;
                    table.push(*row);
                }
                UnitOutcome::Skipped(skip) => {
                    info!(symbol = %skip.symbol, reason = %skip.reason, "symbol skipped");
                    summary.record(&skip.reason);
                    skipped_symbols.push(skip);
                }
            }
            completed += 1;
            on_progress(Progress {
                completed,
                total: requested,
            });
        }

        let scheduled = scheduler.await.unwrap_or(drained);
        summary.not_scheduled = resolved.saturating_sub(scheduled);
        let cancelled = summary.not_scheduled > 0;
        if cancelled {
            warn!(not_scheduled = summary.not_scheduled, "screen cancelled");
        }
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped(),
            "screen finished"
        );

        Ok(ScreenRun {
            table,
            skipped: skipped_symbols,
            summary,
            cancelled,
        })
    }
}
