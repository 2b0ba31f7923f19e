//! Core domain types and logic: indicators, scoring, row assembly,
//! filtering and the fetch-compute-cache orchestration.

pub mod ohlcv;
pub mod indicator;
pub mod scoring;
pub mod row;
pub mod filter;
pub mod universe;
pub mod window;
pub mod fetcher;
pub mod history_cache;
pub mod orchestrator;
pub mod config_validation;
pub mod error;
