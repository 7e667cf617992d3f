//! Analysis templates, typed run parameters, and analysis run records.

use crate::error::CoreError;
use crate::status::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

string_enum! {
    /// Lifecycle of an analysis run.
    pub enum RunStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Canceled => "canceled",
    }
}

impl Lifecycle for RunStatus {
    const ENTITY: &'static str = "analysis run";

    fn can_transition_to(self, next: Self) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Pending, Running | Canceled) | (Running, Success | Failed | Canceled)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Failed | RunStatus::Canceled
        )
    }
}

string_enum! {
    /// Value kind accepted by a template parameter.
    pub enum ParamKind {
        String => "string",
        Integer => "integer",
        Number => "number",
        Boolean => "boolean",
    }
}

impl ParamKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

/// Declaration of one template parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Run parameters: always a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accept a JSON value as parameters; `null` means empty.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(CoreError::invalid_input(
                "parameters",
                format!("expected a JSON object, got {other}"),
            )),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Check these parameters against a template's declarations, filling
    /// defaults. Keys not declared by the template are passed through.
    pub fn conform(mut self, specs: &[ParameterSpec]) -> Result<Self, CoreError> {
        for spec in specs {
            let field = format!("parameters.{}", spec.name);
            match self.0.get(&spec.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &spec.default {
                        self.0.insert(spec.name.clone(), default.clone());
                    } else if spec.required {
                        return Err(CoreError::invalid_input(field, "is required"));
                    }
                }
                Some(value) if !spec.kind.matches(value) => {
                    return Err(CoreError::invalid_input(
                        field,
                        format!("expected {}, got {value}", spec.kind),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(self)
    }
}

/// A reusable analysis definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTemplate {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<i64>,
    pub description: String,
    /// Registry key of the analysis function; `None` runs the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_identifier: Option<String>,
    pub parameter_schema: Vec<ParameterSpec>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub tag_id: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub code_identifier: Option<String>,
    #[serde(default)]
    pub parameter_schema: Vec<ParameterSpec>,
}

/// One execution of a template against a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: i64,
    pub template_id: i64,
    pub dataset_id: i64,
    pub status: RunStatus,
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub log: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("column", ParamKind::String).required(),
            ParameterSpec::new("top", ParamKind::Integer).with_default(json!(10)),
        ]
    }

    #[test]
    fn test_conform_fills_defaults() {
        let params = Parameters::from_value(json!({"column": "species"})).unwrap();
        let params = params.conform(&specs()).unwrap();
        assert_eq!(params.get_str("column"), Some("species"));
        assert_eq!(params.get_u64("top"), Some(10));
    }

    #[test]
    fn test_conform_missing_required() {
        let err = Parameters::new().conform(&specs()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameters.column: is required");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_conform_wrong_kind() {
        let params = Parameters::from_value(json!({"column": "x", "top": "many"})).unwrap();
        let err = params.conform(&specs()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameters.top: expected integer"));
    }

    #[test]
    fn test_parameters_must_be_object() {
        assert!(Parameters::from_value(json!([1, 2])).is_err());
        assert!(Parameters::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_run_transitions() {
        use RunStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Canceled));
        assert!(Running.can_transition_to(Failed));
        assert!(!Success.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Success));
        assert!(Canceled.is_terminal());
    }
}
