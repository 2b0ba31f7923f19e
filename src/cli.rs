//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::adapters::csv_history_adapter::CsvHistoryAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::universe_csv_adapter::read_universe;
use crate::adapters::venue_resolver::VenueResolver;
use crate::domain::config_validation::{
    self, cache_ttl, fetch_policy, filter_criteria, screener_settings, validate_timeout, DATA,
};
use crate::domain::error::ScreenerError;
use crate::domain::fetcher::ResilientFetcher;
use crate::domain::filter::{self, prefilter, FilterCriteria};
use crate::domain::history_cache::HistoryCache;
use crate::domain::indicator::IndicatorVector;
use crate::domain::orchestrator::{
    Progress, ScreenRequest, ScreenRun, Screener, SkipReason, UnitOutcome,
};
use crate::domain::row::ResultTable;
use crate::domain::scoring::ScoreBreakdown;
use crate::domain::universe::{parse_symbol_list, SymbolInput};
use crate::logging::{init_logging, LogFormat};
use crate::ports::clock_port::SystemClock;
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::HistoryProvider;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "momentum-scanner",
    version,
    about = "Screens ticker lists by technical momentum"
)]
pub struct Cli {
    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen a symbol list and print or export the ranked table
    Scan(ScanArgs),
    /// Show the indicator vector and rule points for one symbol
    Inspect(InspectArgs),
    /// Validate a configuration file
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of per-symbol history CSV files; overrides [data] history_dir
    #[arg(long)]
    pub history_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Symbol sheet (CSV with at least a Symbol column)
    #[arg(short, long, conflicts_with = "symbols", required_unless_present = "symbols")]
    pub universe: Option<PathBuf>,

    /// Comma-separated symbols, used instead of a sheet
    #[arg(long)]
    pub symbols: Option<String>,

    /// Exchange hint applied to every --symbols entry
    #[arg(long, requires = "symbols")]
    pub exchange: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_score: Option<u8>,

    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Keep only the N best rows after ranking
    #[arg(long)]
    pub top: Option<usize>,

    /// Write the table to a file ("-" for stdout) instead of printing it
    #[arg(short, long)]
    pub output: Option<String>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
    pub format: ReportFormat,

    /// List every skipped symbol with its reason
    #[arg(long)]
    pub show_skipped: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    pub symbol: String,

    #[arg(long)]
    pub exchange: Option<String>,

    /// Fetch this symbol instead of resolving one
    #[arg(long)]
    pub fetch_symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Csv,
    Json,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(&cli.log_level, cli.log_format);
    let result = match cli.command {
        Command::Scan(args) => run_scan(&args),
        Command::Inspect(args) => run_inspect(&args),
        Command::CheckConfig { config } => run_check_config(&config),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, ScreenerError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

/// History directory from the flag, else `[data] history_dir`.
pub fn history_dir(
    config: &dyn ConfigPort,
    flag: Option<&Path>,
) -> Result<PathBuf, ScreenerError> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    config
        .get_string(DATA, "history_dir")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| ScreenerError::ConfigMissing {
            section: DATA.into(),
            key: "history_dir".into(),
        })
}

/// Wires the provider, fetcher, cache and resolver from validated config.
/// `workers` overrides `[screener] workers`.
pub fn build_screener(
    config: &dyn ConfigPort,
    provider: Arc<dyn HistoryProvider>,
    workers: Option<usize>,
) -> Result<Screener, ScreenerError> {
    let mut settings = screener_settings(config)?;
    if let Some(workers) = workers {
        settings.workers = workers;
    }
    let policy = fetch_policy(config)?;
    validate_timeout(&settings, &policy)?;
    let ttl = cache_ttl(config)?;
    let resolver = VenueResolver::from_config(config)?;

    let clock = Arc::new(SystemClock);
    let fetcher = ResilientFetcher::new(provider, policy);
    let cache = Arc::new(HistoryCache::new(fetcher, clock.clone(), ttl));
    Ok(Screener::new(cache, Arc::new(resolver), clock, settings))
}

/// Builds the request from a sheet or an inline list.
pub fn build_request(args: &ScanArgs) -> Result<ScreenRequest, ScreenerError> {
    if let Some(path) = &args.universe {
        let sheet = read_universe(path)?;
        if sheet.dropped_blank > 0 {
            warn!(
                dropped = sheet.dropped_blank,
                "dropped rows with a blank symbol"
            );
        }
        return Ok(ScreenRequest::from(sheet));
    }
    let raw = args.symbols.as_deref().unwrap_or_default();
    let mut inputs = parse_symbol_list(raw)?;
    if let Some(exchange) = &args.exchange {
        inputs = inputs
            .into_iter()
            .map(|input| input.with_exchange(exchange.clone()))
            .collect();
    }
    Ok(ScreenRequest::from_inputs(inputs))
}

/// Prefilter, run, filter, rank, truncate.
/// Throttles progress lines to roughly every tenth of the run.
#[derive(Debug, Default)]
struct ProgressLog {
    step: Option<usize>,
}

impl ProgressLog {
    fn should_log(&mut self, p: Progress) -> bool {
        let step = *self.step.get_or_insert((p.total / 10).max(1));
        p.completed > 0 && (p.completed % step == 0 || p.completed == p.total)
    }
}

pub async fn screen(
    screener: &Screener,
    mut request: ScreenRequest,
    criteria: &FilterCriteria,
    top: Option<usize>,
    cancel: watch::Receiver<bool>,
) -> Result<(ResultTable, ScreenRun), ScreenerError> {
    if criteria.has_categorical() {
        let before = request.inputs.len();
        request.inputs = prefilter(request.inputs, &request.carried, criteria);
        info!(
            before,
            after = request.inputs.len(),
            "applied categorical prefilter"
        );
    }

    let mut log = ProgressLog::default();
    let run = screener
        .run(request, cancel, |p: Progress| {
            if log.should_log(p) {
                info!(completed = p.completed, total = p.total, "progress");
            }
        })
        .await?;

    let mut table = filter::filter(&run.table, criteria);
    table.rank_by_score();
    if let Some(n) = top {
        table.top(n);
    }
    Ok((table, run))
}

fn runtime() -> Result<tokio::runtime::Runtime, ScreenerError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn run_scan(args: &ScanArgs) -> Result<ExitCode, ScreenerError> {
    let config = load_config(args.source.config.as_deref())?;
    let dir = history_dir(&config, args.source.history_dir.as_deref())?;
    let provider = Arc::new(CsvHistoryAdapter::new(dir));
    let screener = build_screener(&config, provider, args.workers.map(usize::from))?;

    let mut criteria = filter_criteria(&config)?;
    if let Some(min_score) = args.min_score {
        criteria.min_score = min_score;
    }
    let request = build_request(args)?;

    let rt = runtime()?;
    let (table, run) = rt.block_on(async {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight symbols");
                let _ = cancel_tx.send(true);
            }
        });
        screen(&screener, request, &criteria, args.top, cancel_rx).await
    })?;

    match args.output.as_deref() {
        Some(path) => {
            let report: Box<dyn ReportPort> = match args.format {
                ReportFormat::Csv => Box::new(CsvReportAdapter),
                ReportFormat::Json => Box::new(JsonReportAdapter),
            };
            report.write(&table, &run.summary, path)?;
            if path != "-" {
                eprintln!("Wrote {} rows to {}", table.len(), path);
            }
        }
        None => print!("{}", render_table(&table)),
    }

    eprintln!("Summary: {}", run.summary);
    eprintln!(
        "{} of {} analyzed symbols scored at least {}",
        table.len(),
        run.summary.succeeded,
        criteria.min_score
    );
    if args.show_skipped {
        for skip in &run.skipped {
            eprintln!("  skipped {}: {}", skip.symbol, skip.reason);
        }
    }
    debug!(stats = ?screener.cache().stats(), "cache statistics");

    if run.cancelled {
        return Ok(ExitCode::from(130));
    }
    Ok(ExitCode::SUCCESS)
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", decimals, v))
}

/// Fixed-width summary view of a ranked table.
pub fn render_table(table: &ResultTable) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:<14} {:>5}  {:<13} {:>10} {:>8} {:>8} {:>6} {:>6} {:>6}",
        "#", "Symbol", "Score", "Trend", "Last", "5D%", "20D%", "RSI", "ADX", "VolR"
    );
    for (i, row) in table.rows().iter().enumerate() {
        let v = &row.indicators;
        let _ = writeln!(
            out,
            "{:<4} {:<14} {:>5}  {:<13} {:>10.2} {:>8} {:>8} {:>6} {:>6} {:>6}",
            i + 1,
            row.symbol,
            row.score(),
            row.trend().to_string(),
            row.last_price,
            fmt_opt(row.change_5d, 2),
            fmt_opt(row.change_20d, 2),
            fmt_opt(v.rsi, 1),
            fmt_opt(v.adx, 1),
            fmt_opt(v.volume_ratio, 2),
        );
    }
    if table.is_empty() {
        out.push_str("(no rows)\n");
    }
    out
}

/// Indicator vector followed by the per-rule points.
pub fn render_detail(
    symbol: &str,
    fetch_symbol: &str,
    vector: &IndicatorVector,
    breakdown: &ScoreBreakdown,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}), {} bars", symbol, fetch_symbol, vector.bars);
    let fields = [
        ("Price", Some(vector.price)),
        ("EMA12", vector.ema12),
        ("EMA20", vector.ema20),
        ("EMA26", vector.ema26),
        ("EMA50", vector.ema50),
        ("EMA200", vector.ema200),
        ("RSI", vector.rsi),
        ("MACD line", vector.macd_line),
        ("MACD signal", vector.macd_signal),
        ("MACD hist", vector.macd_histogram),
        ("+DI", vector.plus_di),
        ("-DI", vector.minus_di),
        ("ADX", vector.adx),
        ("Volume ratio", vector.volume_ratio),
    ];
    for (name, value) in fields {
        let _ = writeln!(out, "  {:<14} {}", name, fmt_opt(value, 4));
    }
    let _ = writeln!(
        out,
        "  {:<14} bullish={} bearish={}",
        "DI crossover", vector.bullish_crossover, vector.bearish_crossover
    );
    out.push('\n');
    for entry in breakdown.entries() {
        let _ = writeln!(
            out,
            "  {:<16} {:>+4}  {}",
            entry.category.name(),
            entry.points,
            entry.condition
        );
    }
    let _ = writeln!(
        out,
        "  {:<16} {:>4}  {} (raw {})",
        "Total",
        breakdown.total(),
        breakdown.trend(),
        breakdown.raw_total()
    );
    out
}

fn run_inspect(args: &InspectArgs) -> Result<ExitCode, ScreenerError> {
    let config = load_config(args.source.config.as_deref())?;
    let dir = history_dir(&config, args.source.history_dir.as_deref())?;
    let provider = Arc::new(CsvHistoryAdapter::new(dir));
    let screener = build_screener(&config, provider, None)?;

    let mut input = SymbolInput::new(args.symbol.trim().to_uppercase());
    if let Some(exchange) = &args.exchange {
        input = input.with_exchange(exchange.clone());
    }
    if let Some(fetch_symbol) = &args.fetch_symbol {
        input = input.with_fetch_symbol(fetch_symbol.clone());
    }

    let rt = runtime()?;
    let outcome = rt.block_on(screener.inspect(&input))?;
    match outcome {
        UnitOutcome::Row(row) => {
            print!(
                "{}",
                render_detail(&row.symbol, &row.fetch_symbol, &row.indicators, &row.breakdown)
            );
            Ok(ExitCode::SUCCESS)
        }
        UnitOutcome::Skipped(skip) => Err(match skip.reason {
            SkipReason::InsufficientData { bars } => ScreenerError::InsufficientData {
                symbol: skip.symbol,
                bars,
                minimum: screener.settings().min_bars,
            },
            other => {
                warn!(symbol = %skip.symbol, reason = %other, "no usable history");
                ScreenerError::NoData {
                    symbol: skip.symbol,
                }
            }
        }),
    }
}

fn run_check_config(path: &Path) -> Result<ExitCode, ScreenerError> {
    let config = load_config(Some(path))?;
    config_validation::validate_config(&config)?;
    let resolver = VenueResolver::from_config(&config)?;
    let settings = screener_settings(&config)?;
    let policy = fetch_policy(&config)?;
    let criteria = filter_criteria(&config)?;

    println!("Config OK: {}", path.display());
    println!(
        "  workers={} window={} min_bars={} symbol_timeout={}s",
        settings.workers,
        settings.window,
        settings.min_bars,
        settings.symbol_timeout.as_secs()
    );
    println!(
        "  max_attempts={} worst-case retry sleep={}ms cache_ttl={}s",
        policy.max_attempts,
        policy.sleep_ceiling().as_millis(),
        cache_ttl(&config)?.num_seconds()
    );
    println!("  min_score={}", criteria.min_score);
    for (venue, suffix) in resolver.venues() {
        println!("  venue {} -> *{}", venue, suffix);
    }
    match history_dir(&config, None) {
        Ok(dir) => println!("  history_dir={}", dir.display()),
        Err(_) => println!("  history_dir not set; pass --history-dir to scan"),
    }
    Ok(ExitCode::SUCCESS)
}
