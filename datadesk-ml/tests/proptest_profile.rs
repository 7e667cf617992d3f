//! Property-based tests for the profiling and validation engines.

use proptest::prelude::*;

use datadesk_core::{ColumnBound, TabularFormat};
use datadesk_ml::data::{profile_file, validate_file};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type Table = Vec<Vec<Option<f64>>>;

/// Integer or decimal cell; both render through `Display`.
fn cell() -> impl Strategy<Value = f64> {
    prop_oneof![(-1000i32..1000).prop_map(f64::from), -1000.0f64..1000.0]
}

/// 2 to 5 numeric columns, up to 30 rows, roughly one cell in five null.
fn table() -> impl Strategy<Value = Table> {
    (2usize..=5).prop_flat_map(|width| {
        prop::collection::vec(
            prop::collection::vec(prop::option::weighted(0.8, cell()), width),
            0..30,
        )
    })
}

fn write_csv(dir: &Path, rows: &Table, width: usize) -> PathBuf {
    let header: Vec<String> = (0..width).map(|i| format!("c{i}")).collect();
    let mut body = header.join(",");
    body.push('\n');
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|c| c.map(|v| v.to_string()).unwrap_or_default())
            .collect();
        body.push_str(&cells.join(","));
        body.push('\n');
    }
    let path = dir.join("table.csv");
    std::fs::write(&path, body).unwrap();
    path
}

fn width_of(rows: &Table) -> usize {
    rows.first().map_or(3, Vec::len)
}

proptest! {
    #[test]
    fn numeric_columns_have_consistent_stats(rows in table()) {
        let dir = TempDir::new().unwrap();
        let width = width_of(&rows);
        let path = write_csv(dir.path(), &rows, width);
        let data = profile_file(&path, TabularFormat::Csv).unwrap();
        let columns = data.columns().unwrap();
        prop_assert_eq!(columns.len(), width);

        for i in 0..width {
            let profile = &columns[&format!("c{i}")];
            let values: Vec<f64> = rows.iter().filter_map(|r| r[i]).collect();
            let nulls = rows.len() - values.len();
            prop_assert_eq!(profile.null_count, nulls as u64);
            prop_assert!(profile.distinct_count <= (rows.len() - nulls) as u64);

            if values.is_empty() {
                prop_assert!(profile.mean.is_none());
                continue;
            }
            let sum: f64 = values.iter().sum();
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = profile.mean.unwrap();
            prop_assert_eq!(mean, (sum / values.len() as f64).clamp(lo, hi));
            match (&profile.min, &profile.max) {
                (Some(ColumnBound::Number(min)), Some(ColumnBound::Number(max))) => {
                    prop_assert_eq!(*min, lo);
                    prop_assert_eq!(*max, hi);
                    prop_assert!(*min <= mean && mean <= *max);
                }
                other => prop_assert!(false, "expected numeric bounds, got {:?}", other),
            }
        }
    }

    #[test]
    fn profiling_is_deterministic(rows in table()) {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), &rows, width_of(&rows));
        let first = serde_json::to_string(&profile_file(&path, TabularFormat::Csv).unwrap())
            .unwrap();
        let second = serde_json::to_string(&profile_file(&path, TabularFormat::Csv).unwrap())
            .unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn validation_without_schema_counts_shape(rows in table()) {
        let dir = TempDir::new().unwrap();
        let width = width_of(&rows);
        let path = write_csv(dir.path(), &rows, width);
        let report = validate_file(&path, TabularFormat::Csv, None).unwrap();
        prop_assert!(report.valid);
        prop_assert!(report.errors.is_empty());
        prop_assert_eq!(report.column_count, width);
        prop_assert_eq!(report.record_count, rows.len() as u64);
    }
}
