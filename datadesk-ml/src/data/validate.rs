//! Schema validation of a dataset file.

use super::scan::TabularReader;
use crate::error::MlError;
use datadesk_core::{DataField, DataSchema, TabularFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of validating a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub record_count: u64,
    pub column_count: usize,
}

impl ValidationReport {
    /// A report for a dataset whose file could not be read at all.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
            record_count: 0,
            column_count: 0,
        }
    }
}

/// Counters for one schema field found in the header.
struct FieldCheck<'a> {
    field: &'a DataField,
    index: usize,
    type_mismatches: u64,
    disallowed_nulls: u64,
}

/// Stream `path` once, checking its header and values against `schema`.
///
/// Missing required columns are errors. Extra columns, values that do not
/// parse as the declared type, and nulls in non-nullable columns without a
/// default are warnings.
pub fn validate_file(
    path: &Path,
    format: TabularFormat,
    schema: Option<&DataSchema>,
) -> Result<ValidationReport, MlError> {
    let reader = TabularReader::open(path, format)?;
    let columns = reader.headers().to_vec();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut checks: Vec<FieldCheck<'_>> = Vec::new();

    if let Some(schema) = schema {
        for field in schema.required_fields() {
            if !columns.iter().any(|c| c == &field.name) {
                errors.push(format!("Missing required field: {}", field.name));
            }
        }
        for column in &columns {
            if schema.field(column).is_none() {
                warnings.push(format!("Extra field not in schema: {column}"));
            }
        }
        for field in &schema.fields {
            if let Some(index) = columns.iter().position(|c| c == &field.name) {
                checks.push(FieldCheck {
                    field,
                    index,
                    type_mismatches: 0,
                    disallowed_nulls: 0,
                });
            }
        }
    }

    let record_count = reader.for_each_row(|cells| {
        for check in checks.iter_mut() {
            match cells[check.index] {
                Some(value) => {
                    if !check.field.data_type.accepts(value) {
                        check.type_mismatches += 1;
                    }
                }
                None => {
                    if !check.field.nullable && check.field.default.is_none() {
                        check.disallowed_nulls += 1;
                    }
                }
            }
        }
        Ok(())
    })?;

    for check in &checks {
        if check.type_mismatches > 0 {
            warnings.push(format!(
                "Field {}: {} value(s) not parseable as {}",
                check.field.name, check.type_mismatches, check.field.data_type
            ));
        }
        if check.disallowed_nulls > 0 {
            warnings.push(format!(
                "Field {}: {} null value(s) in non-nullable column",
                check.field.name, check.disallowed_nulls
            ));
        }
    }

    Ok(ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        record_count,
        column_count: columns.len(),
    })
}
