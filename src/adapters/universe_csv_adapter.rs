//! Reads the symbol input sheet from a CSV file.

use crate::domain::error::ScreenerError;
use crate::domain::universe::{build_sheet, SymbolSheet};
use std::io::Read;
use std::path::Path;

pub fn read_universe<P: AsRef<Path>>(path: P) -> Result<SymbolSheet, ScreenerError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    read_universe_from(&path.display().to_string(), file)
}

pub fn read_universe_from<R: Read>(source_name: &str, reader: R) -> Result<SymbolSheet, ScreenerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let records = rdr
        .records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect::<Vec<_>>()))
        .collect::<Result<Vec<_>, _>>()?;
    build_sheet(source_name, &headers, records)
}
