//! Tags and the versioned schema registry.

use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

string_enum! {
    /// Category a tag belongs to.
    pub enum TagCategory {
        Dataset => "dataset",
        Analysis => "analysis",
        MlTask => "ml_task",
    }
}

/// A category label grouping schemas, datasets, templates, and models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub category: TagCategory,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

string_enum! {
    /// Declared type of a schema column.
    pub enum DataType {
        Int => "int",
        Float => "float",
        Str => "str",
        Bool => "bool",
        DateTime => "datetime",
    }
}

impl DataType {
    /// Whether a raw (non-empty) cell value parses as this type.
    pub fn accepts(self, raw: &str) -> bool {
        let value = raw.trim();
        match self {
            DataType::Int => value.parse::<i64>().is_ok(),
            DataType::Float => value.parse::<f64>().is_ok(),
            DataType::Str => true,
            DataType::Bool => matches!(
                value.to_ascii_lowercase().as_str(),
                "true" | "false" | "1" | "0" | "yes" | "no" | "t" | "f"
            ),
            DataType::DateTime => {
                DateTime::parse_from_rfc3339(value).is_ok()
                    || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
                    || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
                    || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
            }
        }
    }
}

/// A column definition inside a [`DataSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataField {
    pub id: i64,
    pub schema_id: i64,
    pub name: String,
    pub data_type: DataType,
    pub required: bool,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub position: i64,
    pub description: String,
}

/// A named, versioned set of column definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSchema {
    pub id: i64,
    pub tag_id: i64,
    pub name: String,
    pub version: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Ordered by `position`.
    pub fields: Vec<DataField>,
}

impl DataSchema {
    /// Look up a field by column name.
    pub fn field(&self, name: &str) -> Option<&DataField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that must be present as columns.
    pub fn required_fields(&self) -> impl Iterator<Item = &DataField> {
        self.fields.iter().filter(|f| f.required)
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Input for a new schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewField {
    pub name: String,
    #[serde(rename = "type", alias = "data_type")]
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl NewField {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: false,
            nullable: true,
            default: None,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A complete schema as written in a definition file.
///
/// ```toml
/// name = "iris"
/// version = "1.0"
///
/// [[fields]]
/// name = "sepal_length"
/// type = "float"
/// required = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<NewField>,
}

impl SchemaDefinition {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: NewField) -> Self {
        self.fields.push(field);
        self
    }

    /// Reject empty names and duplicate field names.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_input("name", "must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(CoreError::invalid_input("version", "must not be empty"));
        }
        let mut seen = HashSet::new();
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(CoreError::invalid_input(
                    format!("fields[{i}].name"),
                    "must not be empty",
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::invalid_input(
                    format!("fields[{i}].name"),
                    format!("duplicate field '{}'", field.name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_accepts() {
        assert!(DataType::Int.accepts("42"));
        assert!(DataType::Int.accepts(" -7 "));
        assert!(!DataType::Int.accepts("4.2"));
        assert!(DataType::Float.accepts("4.2"));
        assert!(DataType::Float.accepts("1e3"));
        assert!(!DataType::Float.accepts("abc"));
        assert!(DataType::Str.accepts("anything"));
        assert!(DataType::Bool.accepts("TRUE"));
        assert!(DataType::Bool.accepts("0"));
        assert!(!DataType::Bool.accepts("maybe"));
        assert!(DataType::DateTime.accepts("2024-03-01"));
        assert!(DataType::DateTime.accepts("2024-03-01 12:30:00"));
        assert!(DataType::DateTime.accepts("2024-03-01T12:30:00Z"));
        assert!(!DataType::DateTime.accepts("yesterday"));
    }

    #[test]
    fn test_string_enum_parse_and_display() {
        assert_eq!("ml_task".parse::<TagCategory>().unwrap(), TagCategory::MlTask);
        assert_eq!(DataType::DateTime.to_string(), "datetime");
        let err = "decimal".parse::<DataType>().unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("decimal"));
    }

    #[test]
    fn test_schema_definition_from_toml_shape() {
        let json = serde_json::json!({
            "name": "iris",
            "fields": [
                {"name": "sepal_length", "type": "float", "required": true},
                {"name": "species", "type": "str"}
            ]
        });
        let def: SchemaDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.version, "1.0");
        assert_eq!(def.fields.len(), 2);
        assert!(def.fields[0].required);
        assert!(def.fields[1].nullable);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_schema_definition_rejects_duplicates() {
        let def = SchemaDefinition::new("s", "1")
            .with_field(NewField::new("a", DataType::Int))
            .with_field(NewField::new("a", DataType::Str));
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate field 'a'"));
    }
}
