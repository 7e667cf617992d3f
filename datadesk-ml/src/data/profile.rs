//! Descriptive statistics over a dataset file.

use super::accumulate::ColumnAccumulator;
use super::scan::TabularReader;
use crate::error::MlError;
use datadesk_core::{ProfileData, TabularFormat};
use std::path::Path;

/// Columns of a scanned file, in header order, with their accumulators.
#[derive(Debug, Clone)]
pub struct ColumnScan {
    pub record_count: u64,
    pub columns: Vec<(String, ColumnAccumulator)>,
}

/// Read `path` once, accumulating statistics for every column.
pub fn scan_columns(path: &Path, format: TabularFormat) -> Result<ColumnScan, MlError> {
    let reader = TabularReader::open(path, format)?;
    let names = reader.headers().to_vec();
    let mut accumulators = vec![ColumnAccumulator::new(); names.len()];
    let record_count = reader.for_each_row(|cells| {
        for (acc, cell) in accumulators.iter_mut().zip(cells) {
            acc.push(*cell);
        }
        Ok(())
    })?;
    Ok(ColumnScan {
        record_count,
        columns: names.into_iter().zip(accumulators).collect(),
    })
}

/// Profile a file into per-column statistics keyed by column name.
pub fn profile_file(path: &Path, format: TabularFormat) -> Result<ProfileData, MlError> {
    let scan = scan_columns(path, format)?;
    let columns = scan
        .columns
        .iter()
        .map(|(name, acc)| (name.clone(), acc.profile()))
        .collect();
    Ok(ProfileData::Columns(columns))
}
