//! CSV export of the result table.

use crate::domain::error::ScreenerError;
use crate::domain::orchestrator::RunSummary;
use crate::domain::row::ResultTable;
use crate::ports::report_port::ReportPort;
use std::io::Write;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn write_to<W: Write>(table: &ResultTable, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(table.header())?;
        for record in table.records() {
            wtr.write_record(record.iter().map(|v| v.to_cell()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        table: &ResultTable,
        _summary: &RunSummary,
        output_path: &str,
    ) -> Result<(), ScreenerError> {
        let result = if output_path == "-" {
            Self::write_to(table, std::io::stdout().lock())
        } else {
            std::fs::File::create(output_path)
                .map_err(csv::Error::from)
                .and_then(|file| Self::write_to(table, file))
        };
        result.map_err(|e| ScreenerError::Report {
            path: output_path.to_string(),
            reason: e.to_string(),
        })
    }
}
