//! Report output port.

use crate::domain::error::ScreenerError;
use crate::domain::orchestrator::RunSummary;
use crate::domain::row::ResultTable;

/// Port for exporting a result table. An `output_path` of `-` means stdout.
pub trait ReportPort {
    fn write(
        &self,
        table: &ResultTable,
        summary: &RunSummary,
        output_path: &str,
    ) -> Result<(), ScreenerError>;
}
