//! Stub prediction against ready model versions.

use crate::desk::Desk;
use crate::error::MlError;
use datadesk_core::{ModelVersion, ModelVersionStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NO_READY_MODEL: &str = "No ready model found";

/// Which model to predict with, and the input rows.
///
/// An explicit version id wins over a tag name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub model_version_id: Option<i64>,
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub prediction: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub input: Value,
    pub output: PredictionOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsedModelVersion {
    pub id: i64,
    pub model_name: String,
    pub version: String,
}

/// Prediction result. When no ready version is found, `error` is set and
/// `predictions` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub predictions: Vec<Prediction>,
    pub used_model_version: Option<UsedModelVersion>,
}

impl PredictResponse {
    fn no_ready_model() -> Self {
        Self {
            error: Some(NO_READY_MODEL.to_string()),
            predictions: Vec::new(),
            used_model_version: None,
        }
    }
}

impl Desk {
    /// Predict with the version named by `request`.
    ///
    /// Only a request naming neither a version nor a tag is an error.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, MlError> {
        let Some(version) = self.resolve_ready_version(request)? else {
            tracing::debug!(
                model_version_id = ?request.model_version_id,
                tag_name = ?request.tag_name,
                "No ready model version"
            );
            return Ok(PredictResponse::no_ready_model());
        };
        let model = self.store.get_model(version.model_id)?;

        let predictions = request
            .inputs
            .iter()
            .map(|input| Prediction {
                input: input.clone(),
                output: PredictionOutput {
                    prediction: 0.5,
                    confidence: 0.95,
                },
            })
            .collect();

        Ok(PredictResponse {
            error: None,
            predictions,
            used_model_version: Some(UsedModelVersion {
                id: version.id,
                model_name: model.name,
                version: version.version,
            }),
        })
    }

    fn resolve_ready_version(
        &self,
        request: &PredictRequest,
    ) -> Result<Option<ModelVersion>, MlError> {
        if let Some(id) = request.model_version_id {
            return match self.store.get_model_version(id) {
                Ok(v) if v.status == ModelVersionStatus::Ready => Ok(Some(v)),
                Ok(_) => Ok(None),
                Err(e) if e.status_code() == 404 => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        let tag_name = request
            .tag_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                MlError::invalid_input("either model_version_id or tag_name is required")
            })?;

        let Some(tag) = self.store.find_tag_by_name(tag_name)? else {
            return Ok(None);
        };
        let Some(model) = self.store.find_active_model_for_tag(tag.id)? else {
            return Ok(None);
        };
        Ok(self.store.latest_ready_version(model.id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datadesk_core::{NewModel, NewModelVersion, Store, TagCategory};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn trained(dir: &TempDir) -> (Desk, ModelVersion) {
        let desk = Desk::new(Store::open_in_memory().unwrap(), dir.path().join("models"));
        let tag = desk
            .store()
            .create_tag("churn", TagCategory::MlTask, "")
            .unwrap();
        let model = desk
            .create_model(&NewModel::new("churn-clf", tag.id, "classification"))
            .unwrap();
        let (version, _) = desk
            .create_model_version(model.id, &NewModelVersion {
                version: "1.0".into(),
                ..Default::default()
            })
            .unwrap();
        desk.train_model(version.id).unwrap();
        (desk, version)
    }

    #[test]
    fn test_predict_by_tag() {
        let dir = TempDir::new().unwrap();
        let (desk, version) = trained(&dir);
        let response = desk
            .predict(&PredictRequest {
                tag_name: Some("churn".into()),
                inputs: vec![json!({"x": 1}), json!({"x": 2})],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.error, None);
        assert_eq!(response.predictions.len(), 2);
        assert_eq!(
            serde_json::to_value(&response.predictions[0]).unwrap(),
            json!({"input": {"x": 1}, "output": {"prediction": 0.5, "confidence": 0.95}})
        );
        assert_eq!(
            response.used_model_version,
            Some(UsedModelVersion {
                id: version.id,
                model_name: "churn-clf".into(),
                version: "1.0".into(),
            })
        );
    }

    #[test]
    fn test_predict_without_ready_version() {
        let dir = TempDir::new().unwrap();
        let desk = Desk::new(Store::open_in_memory().unwrap(), dir.path().join("models"));
        let response = desk
            .predict(&PredictRequest {
                tag_name: Some("nothing-here".into()),
                inputs: vec![json!({"x": 1})],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": "No ready model found", "predictions": [], "used_model_version": null})
        );

        let response = desk
            .predict(&PredictRequest {
                model_version_id: Some(99),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.error.as_deref(), Some("No ready model found"));
    }

    #[test]
    fn test_predict_inactive_or_deprecated() {
        let dir = TempDir::new().unwrap();
        let (desk, version) = trained(&dir);
        desk.deprecate_version(version.id).unwrap();
        let response = desk
            .predict(&PredictRequest {
                model_version_id: Some(version.id),
                ..Default::default()
            })
            .unwrap();
        assert!(response.used_model_version.is_none());
    }

    #[test]
    fn test_predict_requires_target() {
        let dir = TempDir::new().unwrap();
        let desk = Desk::new(Store::open_in_memory().unwrap(), dir.path().join("models"));
        let err = desk.predict(&PredictRequest::default()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
