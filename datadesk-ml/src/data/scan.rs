//! Single-pass streaming reader for delimited text files.

use crate::error::MlError;
use datadesk_core::TabularFormat;
use std::fs::File;
use std::path::Path;

/// A header-addressed reader over a CSV or TSV file.
///
/// Cells are yielded as `Option<&str>`: an empty cell, or a cell missing
/// from a short row, is `None`. Fields beyond the header are ignored and
/// blank lines are skipped.
pub struct TabularReader {
    reader: csv::Reader<File>,
    headers: Vec<String>,
}

impl TabularReader {
    pub fn open(path: &Path, format: TabularFormat) -> Result<Self, MlError> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        Ok(Self { reader, headers })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Stream every data row through `visit`, returning the row count.
    pub fn for_each_row<F>(mut self, mut visit: F) -> Result<u64, MlError>
    where
        F: FnMut(&[Option<&str>]) -> Result<(), MlError>,
    {
        let width = self.headers.len();
        let mut record = csv::StringRecord::new();
        let mut rows = 0u64;

        while self.reader.read_record(&mut record)? {
            if record.len() == 1 && record[0].trim().is_empty() && width > 1 {
                continue;
            }
            let cells: Vec<Option<&str>> = (0..width)
                .map(|i| record.get(i).filter(|value| !value.is_empty()))
                .collect();
            visit(&cells)?;
            rows += 1;
        }
        Ok(rows)
    }
}
