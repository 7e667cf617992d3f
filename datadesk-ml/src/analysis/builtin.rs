//! Built-in analyses.

use super::registry::AnalysisInput;
use crate::data::{TabularReader, scan_columns};
use crate::error::MlError;
use crate::runlog::RunLog;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

const DEFAULT_TOP: u64 = 10;

/// Per-column statistics over every column, with `count` and `sum` added.
///
/// No schema cross-checking happens here.
pub fn basic_stats(input: &AnalysisInput<'_>, log: &mut RunLog) -> Result<Value, MlError> {
    let (path, format) = input.require_file()?;
    log.push(format!("Analyzing file: {}", path.display()));

    let scan = scan_columns(path, format)?;
    log.push(format!(
        "Processed {} rows, {} columns",
        scan.record_count,
        scan.columns.len()
    ));

    let mut columns = Map::new();
    for (name, acc) in &scan.columns {
        let mut stats = serde_json::to_value(acc.profile())?;
        if let Value::Object(map) = &mut stats {
            map.insert("count".into(), json!(acc.count()));
            if let Some(sum) = acc.sum() {
                map.insert("sum".into(), json!(sum));
            }
        }
        columns.insert(name.clone(), stats);
    }

    Ok(json!({
        "type": "basic_stats",
        "row_count": scan.record_count,
        "column_count": scan.columns.len(),
        "columns": columns,
    }))
}

/// Most frequent values of one column.
///
/// Parameters: `column` (required), `top` (default 10). Ties are broken by
/// value so the output is stable.
pub fn value_counts(input: &AnalysisInput<'_>, log: &mut RunLog) -> Result<Value, MlError> {
    let column = input
        .parameters
        .get_str("column")
        .ok_or_else(|| MlError::invalid_input("parameters.column is required"))?
        .to_string();
    let top = input.parameters.get_u64("top").unwrap_or(DEFAULT_TOP) as usize;

    let (path, format) = input.require_file()?;
    log.push(format!("Analyzing file: {}", path.display()));

    let reader = TabularReader::open(path, format)?;
    let index = reader
        .headers()
        .iter()
        .position(|h| *h == column)
        .ok_or_else(|| MlError::analysis(format!("Column '{column}' not found")))?;

    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut null_count = 0u64;
    let rows = reader.for_each_row(|cells| {
        match cells[index] {
            Some(value) => *counts.entry(value.to_string()).or_default() += 1,
            None => null_count += 1,
        }
        Ok(())
    })?;
    log.push(format!(
        "Counted {} distinct values in '{column}' over {rows} rows",
        counts.len()
    ));

    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let distinct_count = ranked.len();
    ranked.truncate(top);

    Ok(json!({
        "type": "value_counts",
        "column": column,
        "row_count": rows,
        "null_count": null_count,
        "distinct_count": distinct_count,
        "values": ranked
            .into_iter()
            .map(|(value, count)| json!({"value": value, "count": count}))
            .collect::<Vec<_>>(),
    }))
}

/// Null count and null ratio of every column.
pub fn missing_values(input: &AnalysisInput<'_>, log: &mut RunLog) -> Result<Value, MlError> {
    let (path, format) = input.require_file()?;
    log.push(format!("Analyzing file: {}", path.display()));

    let scan = scan_columns(path, format)?;
    let rows = scan.record_count;
    let mut columns = Map::new();
    for (name, acc) in &scan.columns {
        let ratio = if rows == 0 {
            0.0
        } else {
            acc.null_count() as f64 / rows as f64
        };
        columns.insert(
            name.clone(),
            json!({"null_count": acc.null_count(), "null_ratio": ratio}),
        );
    }
    log.push(format!("Checked {} columns over {rows} rows", columns.len()));

    Ok(json!({
        "type": "missing_values",
        "row_count": rows,
        "columns": columns,
    }))
}
