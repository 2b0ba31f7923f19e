//! JSON export: the run summary plus one object per row keyed by column name.

use crate::domain::error::ScreenerError;
use crate::domain::orchestrator::RunSummary;
use crate::domain::row::ResultTable;
use crate::ports::report_port::ReportPort;
use serde_json::{json, Map, Value};
use std::io::Write;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn to_value(table: &ResultTable, summary: &RunSummary) -> Result<Value, serde_json::Error> {
        let header = table.header();
        let rows = table
            .records()
            .into_iter()
            .map(|record| {
                header
                    .iter()
                    .zip(record)
                    .map(|(name, value)| Ok((name.clone(), serde_json::to_value(value)?)))
                    .collect::<Result<Map<String, Value>, serde_json::Error>>()
                    .map(Value::Object)
            })
            .collect::<Result<Vec<Value>, _>>()?;
        Ok(json!({
            "summary": summary,
            "rows": rows,
        }))
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        table: &ResultTable,
        summary: &RunSummary,
        output_path: &str,
    ) -> Result<(), ScreenerError> {
        let report_err = |reason: String| ScreenerError::Report {
            path: output_path.to_string(),
            reason,
        };
        let value = Self::to_value(table, summary).map_err(|e| report_err(e.to_string()))?;
        let text = serde_json::to_string_pretty(&value).map_err(|e| report_err(e.to_string()))?;
        if output_path == "-" {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", text).map_err(|e| report_err(e.to_string()))
        } else {
            std::fs::write(output_path, text + "\n").map_err(|e| report_err(e.to_string()))
        }
    }
}
