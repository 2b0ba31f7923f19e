//! CLI wiring tests against real files on disk.
//!
//! Tests cover:
//! - Config loading and validation (check-config path)
//! - Universe sheet, CSV history directory and venue resolution end to end
//! - Report export as CSV and JSON

mod common;

use clap::Parser;
use common::*;
use momentum_scanner::adapters::csv_history_adapter::CsvHistoryAdapter;
use momentum_scanner::adapters::csv_report_adapter::CsvReportAdapter;
use momentum_scanner::adapters::file_config_adapter::FileConfigAdapter;
use momentum_scanner::adapters::json_report_adapter::JsonReportAdapter;
use momentum_scanner::cli::{self, Cli, Command};
use momentum_scanner::domain::config_validation::{filter_criteria, validate_config};
use momentum_scanner::domain::error::ScreenerError;
use momentum_scanner::domain::filter::FilterCriteria;
use momentum_scanner::domain::orchestrator::{RunSummary, SkipReason};
use momentum_scanner::domain::row::ResultTable;
use momentum_scanner::ports::report_port::ReportPort;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

const CONFIG: &str = r#"
[screener]
workers = 2
window = 2y
min_bars = 60
venue_suffixes = NSE=.NS, LSE=.L

[fetch]
max_attempts = 2
backoff_base_ms = 0
backoff_max_ms = 0
jitter_min_ms = 0
jitter_max_ms = 0

[cache]
ttl_secs = 600

[filter]
min_score = 50
"#;

const UNIVERSE: &str = "symbol,Exchange,SECTOR,Country,Notes\n\
    tcs,NSE,Technology,India,core\n\
    shel,LSE,Energy,UK,\n\
    thin,NSE,Energy,India,\n\
    ,NSE,Energy,India,blank row\n\
    ghost,NSE,Utilities,India,\n";

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// History files for TCS.NS and SHEL.L (260 rising bars) and THIN.NS (30 bars).
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let history = dir.path().join("history");
    std::fs::create_dir(&history).unwrap();
    write_history_csv(&history, "TCS.NS", &linear_bars(260, 100.0, 200.0));
    write_history_csv(&history, "SHEL.L", &linear_bars(260, 50.0, 80.0));
    write_history_csv(&history, "THIN.NS", &linear_bars(30, 10.0, 12.0));
    std::fs::write(dir.path().join("universe.csv"), UNIVERSE).unwrap();
    dir
}

fn scan_args(dir: &Path, extra: &[&str]) -> cli::ScanArgs {
    let universe = dir.join("universe.csv");
    let mut argv = vec![
        "momentum-scanner".to_string(),
        "scan".to_string(),
        "--universe".to_string(),
        universe.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    match Cli::try_parse_from(argv).unwrap().command {
        Command::Scan(args) => args,
        other => panic!("expected scan, got {:?}", other),
    }
}

mod config_loading {
    use super::*;

    #[test]
    fn sample_config_validates() {
        let file = write_temp_ini(CONFIG);
        let config = cli::load_config(Some(file.path())).unwrap();
        validate_config(&config).unwrap();
        assert_eq!(filter_criteria(&config).unwrap().min_score, 50);
    }

    #[test]
    fn invalid_config_maps_to_config_exit_code() {
        let file = write_temp_ini("[fetch]\nmax_attempts = 0\n");
        let config = cli::load_config(Some(file.path())).unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { .. }));
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
    }

    #[test]
    fn missing_config_file_is_a_parse_error() {
        let err = cli::load_config(Some(Path::new("/no/such/screener.ini"))).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigParse { .. }));
    }

    #[test]
    fn bad_venue_table_is_rejected_by_builder() {
        let file = write_temp_ini("[screener]\nvenue_suffixes = NSE\n");
        let config = cli::load_config(Some(file.path())).unwrap();
        let provider = Arc::new(MockHistoryProvider::new());
        assert!(matches!(
            cli::build_screener(&config, provider, None),
            Err(ScreenerError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn check_config_subcommand_succeeds() {
        let file = write_temp_ini(CONFIG);
        let path = file.path().display().to_string();
        let cli = Cli::try_parse_from(["momentum-scanner", "check-config", "--config", &path]).unwrap();
        assert_eq!(cli::run(cli), ExitCode::SUCCESS);
    }
}

mod scan_pipeline {
    use super::*;

    #[tokio::test]
    async fn universe_to_ranked_table() {
        let dir = workspace();
        let config = FileConfigAdapter::from_string(CONFIG).unwrap();
        let history = cli::history_dir(&config, Some(dir.path().join("history").as_path())).unwrap();
        let provider = Arc::new(CsvHistoryAdapter::new(history));
        let screener = cli::build_screener(&config, provider, None).unwrap();
        let criteria = filter_criteria(&config).unwrap();

        let args = scan_args(dir.path(), &[]);
        let request = cli::build_request(&args).unwrap();
        assert_eq!(request.inputs.len(), 4);

        let (_tx, rx) = watch::channel(false);
        let (table, run) = cli::screen(&screener, request, &criteria, None, rx)
            .await
            .unwrap();

        assert_eq!(run.summary.requested, 4);
        assert_eq!(run.summary.succeeded, 2);
        assert_eq!(run.summary.skipped_insufficient, 1);
        assert_eq!(run.summary.skipped_fetch_failure, 1);
        let ghost = run.skipped.iter().find(|s| s.symbol == "GHOST").unwrap();
        assert_eq!(ghost.fetch_symbol.as_deref(), Some("GHOST.NS"));
        assert!(matches!(ghost.reason, SkipReason::FetchFailure { .. }));

        let symbols: Vec<&str> = table.rows().iter().map(|r| r.symbol.as_str()).collect();
        assert!(symbols.contains(&"TCS"));
        assert!(table.rows().windows(2).all(|w| w[0].score() >= w[1].score()));
        let tcs = table.rows().iter().find(|r| r.symbol == "TCS").unwrap();
        assert_eq!(tcs.fetch_symbol, "TCS.NS");
        assert_eq!(tcs.metadata.get("Sector").map(String::as_str), Some("Technology"));
        assert_eq!(tcs.metadata.get("Notes").map(String::as_str), Some("core"));
    }

    #[tokio::test]
    async fn sector_filter_prefilters_the_universe() {
        let dir = workspace();
        let config = FileConfigAdapter::from_string(&format!("{}sector = Energy\n", CONFIG)).unwrap();
        let provider = Arc::new(CsvHistoryAdapter::new(dir.path().join("history")));
        let screener = cli::build_screener(&config, provider, Some(1)).unwrap();
        let mut criteria = filter_criteria(&config).unwrap();
        criteria.min_score = 0;

        let request = cli::build_request(&scan_args(dir.path(), &[])).unwrap();
        let (_tx, rx) = watch::channel(false);
        let (table, run) = cli::screen(&screener, request, &criteria, None, rx)
            .await
            .unwrap();

        // TCS and GHOST never reach the provider.
        assert_eq!(run.summary.requested, 2);
        let symbols: Vec<&str> = table.rows().iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SHEL"]);
        assert_eq!(screener.settings().workers, 1);
    }

    #[tokio::test]
    async fn top_truncates_after_ranking() {
        let dir = workspace();
        let config = FileConfigAdapter::from_string(CONFIG).unwrap();
        let provider = Arc::new(CsvHistoryAdapter::new(dir.path().join("history")));
        let screener = cli::build_screener(&config, provider, None).unwrap();
        let request = cli::build_request(&scan_args(dir.path(), &[])).unwrap();
        let criteria = FilterCriteria::new(0);

        let (_tx, rx) = watch::channel(false);
        let (table, run) = cli::screen(&screener, request, &criteria, Some(1), rx)
            .await
            .unwrap();
        assert_eq!(run.table.len(), 2);
        assert_eq!(table.len(), 1);
        let best = run.table.rows().iter().map(|r| r.score()).max().unwrap();
        assert_eq!(table.rows()[0].score(), best);
    }
}

mod export {
    use super::*;

    async fn scanned(dir: &Path) -> (ResultTable, RunSummary) {
        let config = FileConfigAdapter::from_string(CONFIG).unwrap();
        let provider = Arc::new(CsvHistoryAdapter::new(dir.join("history")));
        let screener = cli::build_screener(&config, provider, None).unwrap();
        let request = cli::build_request(&scan_args(dir, &[])).unwrap();
        let criteria = FilterCriteria::new(0);
        let (_tx, rx) = watch::channel(false);
        let (table, run) = cli::screen(&screener, request, &criteria, None, rx)
            .await
            .unwrap();
        (table, run.summary)
    }

    #[tokio::test]
    async fn csv_export_has_stable_header() {
        let dir = workspace();
        let (table, summary) = scanned(dir.path()).await;
        let out = dir.path().join("ranked.csv");
        CsvReportAdapter
            .write(&table, &summary, out.to_str().unwrap())
            .unwrap();

        let mut rdr = csv::Reader::from_path(&out).unwrap();
        let header: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header[0], "Symbol");
        assert!(header.contains(&"Momentum_Score".to_string()));
        assert!(header.contains(&"Sector".to_string()));
        assert_eq!(rdr.records().count(), 2);
    }

    #[tokio::test]
    async fn json_export_carries_summary() {
        let dir = workspace();
        let (table, summary) = scanned(dir.path()).await;
        let out = dir.path().join("ranked.json");
        JsonReportAdapter
            .write(&table, &summary, out.to_str().unwrap())
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["summary"]["requested"], 4);
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn unwritable_path_is_a_report_error() {
        let table = ResultTable::default();
        let summary = RunSummary::default();
        let err = CsvReportAdapter
            .write(&table, &summary, "/no/such/dir/out.csv")
            .unwrap_err();
        assert!(matches!(err, ScreenerError::Report { .. }));
        assert_eq!(ExitCode::from(&err), ExitCode::from(1));
    }
}
