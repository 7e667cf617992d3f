//! Dataset records: lifecycle, backing files, and the stored profile.

use crate::status::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

string_enum! {
    /// Lifecycle of a dataset.
    pub enum DatasetStatus {
        Registered => "registered",
        Validating => "validating",
        Validated => "validated",
        Invalid => "invalid",
        Archived => "archived",
    }
}

impl Lifecycle for DatasetStatus {
    const ENTITY: &'static str = "dataset";

    fn can_transition_to(self, next: Self) -> bool {
        use DatasetStatus::*;
        matches!(
            (self, next),
            (Registered | Validated | Invalid, Validating)
                | (Validating, Validated | Invalid)
                | (Registered | Validated | Invalid, Archived)
        )
    }

    fn is_terminal(self) -> bool {
        self == DatasetStatus::Archived
    }
}

string_enum! {
    /// Where a dataset's data came from.
    pub enum SourceType {
        CsvUpload => "csv_upload",
        ExternalSystem => "external_system",
        Manual => "manual",
    }
}

/// A registered dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub tag_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<i64>,
    pub description: String,
    pub source_type: SourceType,
    pub source_info: String,
    pub status: DatasetStatus,
    /// Row count observed by the last validation pass that read the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_records: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDataset {
    pub name: String,
    pub tag_id: i64,
    #[serde(default)]
    pub schema_id: Option<i64>,
    #[serde(default)]
    pub description: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_info: String,
}

impl NewDataset {
    pub fn new(name: impl Into<String>, tag_id: i64) -> Self {
        Self {
            name: name.into(),
            tag_id,
            schema_id: None,
            description: String::new(),
            source_type: SourceType::CsvUpload,
            source_info: String::new(),
        }
    }

    pub fn with_schema(mut self, schema_id: i64) -> Self {
        self.schema_id = Some(schema_id);
        self
    }
}

/// Delimited text formats the engines can scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabularFormat {
    Csv,
    Tsv,
}

impl TabularFormat {
    /// Recognize a file format label (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            _ => None,
        }
    }

    pub fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }
}

/// Guess a format label from a file extension, defaulting to `csv`.
pub fn format_from_path(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "csv".to_string())
}

/// A file attached to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFile {
    pub id: i64,
    pub dataset_id: i64,
    pub path: PathBuf,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub position: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl DatasetFile {
    /// The scannable format of this file, if any.
    pub fn tabular_format(&self) -> Option<TabularFormat> {
        TabularFormat::from_label(&self.format)
    }
}

/// Input for attaching a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDatasetFile {
    pub path: PathBuf,
    pub format: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub position: i64,
}

/// Lower or upper bound of a column: numeric when every value is a
/// number, otherwise the lexicographic string bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnBound {
    Number(f64),
    Text(String),
}

/// Descriptive statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub null_count: u64,
    pub distinct_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<ColumnBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<ColumnBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
}

/// Body of a stored profile: per-column stats, or an error marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileData {
    Failed { error: String },
    Columns(BTreeMap<String, ColumnProfile>),
}

impl ProfileData {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn columns(&self) -> Option<&BTreeMap<String, ColumnProfile>> {
        match self {
            Self::Columns(columns) => Some(columns),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Columns(_) => None,
        }
    }
}

/// The single profile owned by a dataset. Regeneration overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub dataset_id: i64,
    pub data: ProfileData,
    pub generated_at: DateTime<Utc>,
}

/// Filters for listing datasets.
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    pub tag_id: Option<i64>,
    pub status: Option<DatasetStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_transitions() {
        use DatasetStatus::*;
        assert!(Registered.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Validated));
        assert!(Validating.can_transition_to(Invalid));
        assert!(Invalid.can_transition_to(Validating));
        assert!(Validated.can_transition_to(Archived));
        assert!(!Registered.can_transition_to(Validated));
        assert!(!Archived.can_transition_to(Validating));
        assert!(!Validating.can_transition_to(Archived));
        assert!(Archived.is_terminal());
        let err = Archived.transition(Validating).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid dataset status transition: archived -> validating"
        );
    }

    #[test]
    fn test_tabular_format_recognition() {
        assert_eq!(TabularFormat::from_label("CSV"), Some(TabularFormat::Csv));
        assert_eq!(TabularFormat::from_label("tsv"), Some(TabularFormat::Tsv));
        assert_eq!(TabularFormat::from_label("parquet"), None);
        assert_eq!(format_from_path(Path::new("data/iris.TSV")), "tsv");
        assert_eq!(format_from_path(Path::new("data/noext")), "csv");
    }

    #[test]
    fn test_profile_data_serialization() {
        let failed = ProfileData::failed("No valid CSV file found");
        assert_eq!(
            serde_json::to_string(&failed).unwrap(),
            r#"{"error":"No valid CSV file found"}"#
        );

        let mut columns = BTreeMap::new();
        columns.insert(
            "b".to_string(),
            ColumnProfile {
                null_count: 0,
                distinct_count: 3,
                min: Some(ColumnBound::Text("bar".into())),
                max: Some(ColumnBound::Text("foo".into())),
                mean: None,
            },
        );
        columns.insert(
            "a".to_string(),
            ColumnProfile {
                null_count: 1,
                distinct_count: 2,
                min: Some(ColumnBound::Number(1.0)),
                max: Some(ColumnBound::Number(2.0)),
                mean: Some(1.5),
            },
        );
        let data = ProfileData::Columns(columns);
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.starts_with(r#"{"a":"#));
        let back: ProfileData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
        assert!(back.error().is_none());
    }
}
