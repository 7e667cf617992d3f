//! Datasets, their files, and their profile.

use super::{Store, count_column, json_column};
use crate::dataset::{
    Dataset, DatasetFile, DatasetFilter, DatasetProfile, DatasetStatus, NewDataset,
    NewDatasetFile, ProfileData,
};
use crate::error::{CoreError, Result};
use crate::status::Lifecycle;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use std::path::PathBuf;

const DATASET_COLUMNS: &str = "id, name, tag_id, schema_id, description, source_type, source_info, status, num_records, created_at, updated_at";
const FILE_COLUMNS: &str =
    "id, dataset_id, path, format, size, checksum, position, uploaded_at";

fn dataset_from_row(row: &Row<'_>) -> rusqlite::Result<Dataset> {
    Ok(Dataset {
        id: row.get(0)?,
        name: row.get(1)?,
        tag_id: row.get(2)?,
        schema_id: row.get(3)?,
        description: row.get(4)?,
        source_type: row.get(5)?,
        source_info: row.get(6)?,
        status: row.get(7)?,
        num_records: count_column(row, 8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<DatasetFile> {
    let path: String = row.get(2)?;
    Ok(DatasetFile {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        path: PathBuf::from(path),
        format: row.get(3)?,
        size: count_column(row, 4)?,
        checksum: row.get(5)?,
        position: row.get(6)?,
        uploaded_at: row.get(7)?,
    })
}

impl Store {
    /// Register a dataset in status `registered`.
    pub fn insert_dataset(&self, new: &NewDataset) -> Result<Dataset> {
        if new.name.trim().is_empty() {
            return Err(CoreError::invalid_input("name", "must not be empty"));
        }
        self.get_tag(new.tag_id)?;
        if let Some(schema_id) = new.schema_id {
            self.get_schema(schema_id)?;
        }
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO datasets (name, tag_id, schema_id, description, source_type, source_info, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                new.name,
                new.tag_id,
                new.schema_id,
                new.description,
                new.source_type,
                new.source_info,
                DatasetStatus::Registered,
                now,
            ],
        )?;
        self.get_dataset(self.conn.last_insert_rowid())
    }

    pub fn get_dataset(&self, id: i64) -> Result<Dataset> {
        self.conn
            .query_row(
                &format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE id = ?1"),
                [id],
                dataset_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("dataset", id))
    }

    /// Datasets newest first, optionally filtered by tag and status.
    pub fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<Dataset>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DATASET_COLUMNS} FROM datasets
             WHERE (?1 IS NULL OR tag_id = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map(params![filter.tag_id, filter.status], dataset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Move a dataset along its lifecycle.
    pub fn transition_dataset(&self, id: i64, next: DatasetStatus) -> Result<Dataset> {
        let current = self.get_dataset(id)?;
        current.status.transition(next)?;
        self.conn.execute(
            "UPDATE datasets SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![next, Utc::now(), id],
        )?;
        tracing::debug!(
            dataset_id = id,
            from = %current.status,
            to = %next,
            "Dataset status changed"
        );
        self.get_dataset(id)
    }

    pub fn set_dataset_num_records(&self, id: i64, num_records: u64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE datasets SET num_records = ?1, updated_at = ?2 WHERE id = ?3",
            params![num_records as i64, Utc::now(), id],
        )?;
        if updated == 0 {
            return Err(CoreError::not_found("dataset", id));
        }
        Ok(())
    }

    pub fn add_dataset_file(&self, dataset_id: i64, file: &NewDatasetFile) -> Result<DatasetFile> {
        self.get_dataset(dataset_id)?;
        self.conn.execute(
            "INSERT INTO dataset_files (dataset_id, path, format, size, checksum, position, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                dataset_id,
                file.path.to_string_lossy(),
                file.format,
                file.size.map(|s| s as i64),
                file.checksum,
                file.position,
                Utc::now(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(self.conn.query_row(
            &format!("SELECT {FILE_COLUMNS} FROM dataset_files WHERE id = ?1"),
            [id],
            file_from_row,
        )?)
    }

    /// Files of a dataset ordered by position, then id.
    pub fn dataset_files(&self, dataset_id: i64) -> Result<Vec<DatasetFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM dataset_files WHERE dataset_id = ?1 ORDER BY position, id"
        ))?;
        let files = stmt
            .query_map([dataset_id], file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Insert or replace the profile of a dataset.
    pub fn upsert_profile(&self, dataset_id: i64, data: &ProfileData) -> Result<DatasetProfile> {
        self.get_dataset(dataset_id)?;
        let json = super::to_json(data)?;
        self.conn.execute(
            "INSERT INTO dataset_profiles (dataset_id, data, generated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(dataset_id) DO UPDATE SET data = excluded.data, generated_at = excluded.generated_at",
            params![dataset_id, json, Utc::now()],
        )?;
        self.get_profile(dataset_id)?
            .ok_or_else(|| CoreError::not_found("profile", dataset_id))
    }

    pub fn get_profile(&self, dataset_id: i64) -> Result<Option<DatasetProfile>> {
        Ok(self
            .conn
            .query_row(
                "SELECT dataset_id, data, generated_at FROM dataset_profiles WHERE dataset_id = ?1",
                [dataset_id],
                |row| {
                    Ok(DatasetProfile {
                        dataset_id: row.get(0)?,
                        data: json_column(row, 1)?,
                        generated_at: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Raw JSON text of a stored profile.
    pub fn profile_json(&self, dataset_id: i64) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT data FROM dataset_profiles WHERE dataset_id = ?1",
                [dataset_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TagCategory;
    use crate::dataset::{ColumnProfile, SourceType};
    use std::collections::BTreeMap;

    fn seeded() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let tag = store.create_tag("sales", TagCategory::Dataset, "").unwrap();
        (store, tag.id)
    }

    #[test]
    fn test_insert_and_get_dataset() {
        let (store, tag_id) = seeded();
        let mut new = NewDataset::new("q1", tag_id);
        new.source_type = SourceType::Manual;
        let ds = store.insert_dataset(&new).unwrap();
        assert_eq!(ds.status, DatasetStatus::Registered);
        assert_eq!(ds.source_type, SourceType::Manual);
        assert!(ds.num_records.is_none());
        assert_eq!(store.get_dataset(ds.id).unwrap(), ds);
    }

    #[test]
    fn test_insert_dataset_unknown_refs() {
        let (store, tag_id) = seeded();
        assert_eq!(
            store
                .insert_dataset(&NewDataset::new("x", 77))
                .unwrap_err()
                .status_code(),
            404
        );
        let err = store
            .insert_dataset(&NewDataset::new("x", tag_id).with_schema(5))
            .unwrap_err();
        assert_eq!(err.to_string(), "schema 5 not found");
    }

    #[test]
    fn test_transition_dataset_enforces_table() {
        let (store, tag_id) = seeded();
        let ds = store.insert_dataset(&NewDataset::new("q1", tag_id)).unwrap();
        let err = store
            .transition_dataset(ds.id, DatasetStatus::Validated)
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        store.transition_dataset(ds.id, DatasetStatus::Validating).unwrap();
        let ds = store.transition_dataset(ds.id, DatasetStatus::Validated).unwrap();
        assert_eq!(ds.status, DatasetStatus::Validated);
    }

    #[test]
    fn test_list_datasets_filters() {
        let (store, tag_id) = seeded();
        let a = store.insert_dataset(&NewDataset::new("a", tag_id)).unwrap();
        store.insert_dataset(&NewDataset::new("b", tag_id)).unwrap();
        store.transition_dataset(a.id, DatasetStatus::Archived).unwrap();

        let all = store.list_datasets(&DatasetFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "b");
        let archived = store
            .list_datasets(&DatasetFilter {
                status: Some(DatasetStatus::Archived),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, a.id);
    }

    #[test]
    fn test_files_ordered_by_position_then_id() {
        let (store, tag_id) = seeded();
        let ds = store.insert_dataset(&NewDataset::new("q1", tag_id)).unwrap();
        for (name, position) in [("late.csv", 2), ("first.csv", 0), ("second.csv", 0)] {
            store
                .add_dataset_file(
                    ds.id,
                    &NewDatasetFile {
                        path: PathBuf::from(name),
                        format: "csv".into(),
                        size: Some(10),
                        checksum: None,
                        position,
                    },
                )
                .unwrap();
        }
        let names: Vec<_> = store
            .dataset_files(ds.id)
            .unwrap()
            .into_iter()
            .map(|f| f.path.display().to_string())
            .collect();
        assert_eq!(names, ["first.csv", "second.csv", "late.csv"]);
    }

    #[test]
    fn test_profile_upsert_replaces() {
        let (store, tag_id) = seeded();
        let ds = store.insert_dataset(&NewDataset::new("q1", tag_id)).unwrap();
        assert!(store.get_profile(ds.id).unwrap().is_none());

        store
            .upsert_profile(ds.id, &ProfileData::failed("No valid CSV file found"))
            .unwrap();
        let mut columns = BTreeMap::new();
        columns.insert(
            "a".to_string(),
            ColumnProfile {
                null_count: 0,
                distinct_count: 1,
                min: None,
                max: None,
                mean: None,
            },
        );
        let profile = store
            .upsert_profile(ds.id, &ProfileData::Columns(columns))
            .unwrap();
        assert!(profile.data.columns().is_some());

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM dataset_profiles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_set_num_records() {
        let (store, tag_id) = seeded();
        let ds = store.insert_dataset(&NewDataset::new("q1", tag_id)).unwrap();
        store.set_dataset_num_records(ds.id, 3).unwrap();
        assert_eq!(store.get_dataset(ds.id).unwrap().num_records, Some(3));
        assert!(store.set_dataset_num_records(404, 1).is_err());
    }
}
