//! Dataset operations: registration, files, validation, profiling.

use crate::data::{ValidationReport, hash_file, profile_file, select_tabular_file, validate_file};
use crate::desk::Desk;
use crate::error::MlError;
use datadesk_core::dataset::format_from_path;
use datadesk_core::{
    AuditEvent, DataSchema, Dataset, DatasetFile, DatasetProfile, DatasetStatus, NewDataset,
    NewDatasetFile, ProfileData, TargetRef,
};
use serde_json::json;
use std::path::Path;

const NO_FILE: &str = "No CSV file found in dataset";

impl Desk {
    pub fn register_dataset(&self, new: &NewDataset) -> Result<Dataset, MlError> {
        let dataset = self.store.insert_dataset(new)?;
        self.audit(
            AuditEvent::DatasetUploaded,
            None,
            TargetRef::Dataset(dataset.id),
            &format!("Dataset \"{}\" registered", dataset.name),
            json!({"tag_id": dataset.tag_id, "source_type": dataset.source_type}),
        )?;
        tracing::info!(dataset_id = dataset.id, name = %dataset.name, "Dataset registered");
        Ok(dataset)
    }

    /// Attach a file. Size and checksum are filled in when the file exists;
    /// the format is guessed from the extension unless given.
    pub fn add_dataset_file(
        &self,
        dataset_id: i64,
        path: &Path,
        format: Option<&str>,
        position: i64,
    ) -> Result<DatasetFile, MlError> {
        let (size, checksum) = if path.is_file() {
            (Some(std::fs::metadata(path)?.len()), Some(hash_file(path)?))
        } else {
            tracing::warn!(path = %path.display(), "Attaching a file that does not exist yet");
            (None, None)
        };
        let file = NewDatasetFile {
            path: path.to_path_buf(),
            format: format
                .map(|f| f.trim().to_ascii_lowercase())
                .unwrap_or_else(|| format_from_path(path)),
            size,
            checksum,
            position,
        };
        Ok(self.store.add_dataset_file(dataset_id, &file)?)
    }

    /// Validate a dataset against its schema and record the outcome.
    ///
    /// Unreadable or missing files, and a schema that cannot be loaded,
    /// produce an `invalid` dataset and a failed report, not an `Err`.
    pub fn validate_dataset(&self, dataset_id: i64) -> Result<ValidationReport, MlError> {
        let dataset = self.store.get_dataset(dataset_id)?;
        let inputs = self.validation_inputs(&dataset);
        self.store
            .transition_dataset(dataset_id, DatasetStatus::Validating)?;

        let report = inputs
            .and_then(|(files, schema)| self.check_files(dataset_id, &files, schema.as_ref()))
            .unwrap_or_else(|e| ValidationReport::failed(format!("Validation error: {e}")));

        let next = if report.valid {
            DatasetStatus::Validated
        } else {
            DatasetStatus::Invalid
        };
        self.store.transition_dataset(dataset_id, next)?;
        self.audit(
            AuditEvent::DatasetValidated,
            None,
            TargetRef::Dataset(dataset_id),
            &format!("Dataset \"{}\" validated: {next}", dataset.name),
            json!({
                "valid": report.valid,
                "errors": report.errors.len(),
                "warnings": report.warnings.len(),
            }),
        )?;
        tracing::info!(
            dataset_id,
            valid = report.valid,
            records = report.record_count,
            "Dataset validated"
        );
        Ok(report)
    }

    fn validation_inputs(
        &self,
        dataset: &Dataset,
    ) -> Result<(Vec<DatasetFile>, Option<DataSchema>), MlError> {
        let files = self.store.dataset_files(dataset.id)?;
        let schema = dataset
            .schema_id
            .map(|id| self.store.get_schema(id))
            .transpose()?;
        Ok((files, schema))
    }

    fn check_files(
        &self,
        dataset_id: i64,
        files: &[DatasetFile],
        schema: Option<&DataSchema>,
    ) -> Result<ValidationReport, MlError> {
        let Some((file, format)) = select_tabular_file(files) else {
            return Ok(ValidationReport::failed(NO_FILE));
        };
        if !file.path.exists() {
            return Ok(ValidationReport::failed(format!(
                "File not found: {}",
                file.path.display()
            )));
        }
        let report = validate_file(&file.path, format, schema)?;
        self.store
            .set_dataset_num_records(dataset_id, report.record_count)?;
        Ok(report)
    }

    /// Compute and store the profile of a dataset.
    ///
    /// A missing file or a parse failure is stored as an error marker.
    pub fn profile_dataset(&self, dataset_id: i64) -> Result<DatasetProfile, MlError> {
        let dataset = self.store.get_dataset(dataset_id)?;
        let files = self.store.dataset_files(dataset_id)?;

        let data = match select_tabular_file(&files) {
            Some((file, format)) if file.path.exists() => profile_file(&file.path, format)
                .unwrap_or_else(|e| {
                    tracing::warn!(dataset_id, error = %e, "Profiling failed");
                    ProfileData::failed(e.to_string())
                }),
            _ => ProfileData::failed("No valid CSV file found"),
        };

        let profile = self.store.upsert_profile(dataset_id, &data)?;
        self.audit(
            AuditEvent::DatasetProfiled,
            None,
            TargetRef::Dataset(dataset_id),
            &format!("Dataset \"{}\" profiled", dataset.name),
            json!({
                "columns": data.columns().map(|c| c.len()),
                "error": data.error(),
            }),
        )?;
        Ok(profile)
    }

    pub fn archive_dataset(&self, dataset_id: i64) -> Result<Dataset, MlError> {
        let dataset = self.store.transition_dataset(dataset_id, DatasetStatus::Archived)?;
        self.audit(
            AuditEvent::DatasetArchived,
            None,
            TargetRef::Dataset(dataset_id),
            &format!("Dataset \"{}\" archived", dataset.name),
            json!({}),
        )?;
        Ok(dataset)
    }
}
