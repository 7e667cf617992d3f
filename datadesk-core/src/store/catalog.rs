//! Tags, schemas, and fields.

use super::Store;
use crate::catalog::{DataField, DataSchema, NewField, SchemaDefinition, Tag, TagCategory};
use crate::error::{CoreError, Result, map_unique};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

const TAG_COLUMNS: &str = "id, name, category, description, created_at";
const SCHEMA_COLUMNS: &str = "id, tag_id, name, version, description, created_at";
const FIELD_COLUMNS: &str =
    "id, schema_id, name, data_type, required, nullable, default_value, position, description";

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn schema_from_row(row: &Row<'_>) -> rusqlite::Result<DataSchema> {
    Ok(DataSchema {
        id: row.get(0)?,
        tag_id: row.get(1)?,
        name: row.get(2)?,
        version: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        fields: Vec::new(),
    })
}

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<DataField> {
    Ok(DataField {
        id: row.get(0)?,
        schema_id: row.get(1)?,
        name: row.get(2)?,
        data_type: row.get(3)?,
        required: row.get(4)?,
        nullable: row.get(5)?,
        default: row.get(6)?,
        position: row.get(7)?,
        description: row.get(8)?,
    })
}

fn insert_field(
    conn: &rusqlite::Connection,
    schema_id: i64,
    field: &NewField,
    position: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO data_fields (schema_id, name, data_type, required, nullable, default_value, position, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            schema_id,
            field.name,
            field.data_type,
            field.required,
            field.nullable,
            field.default,
            position,
            field.description,
        ],
    )
    .map_err(|e| map_unique(e, "field", &field.name))?;
    Ok(conn.last_insert_rowid())
}

impl Store {
    pub fn create_tag(
        &self,
        name: &str,
        category: TagCategory,
        description: &str,
    ) -> Result<Tag> {
        if name.trim().is_empty() {
            return Err(CoreError::invalid_input("name", "must not be empty"));
        }
        self.conn
            .execute(
                "INSERT INTO tags (name, category, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, category, description, Utc::now()],
            )
            .map_err(|e| map_unique(e, "tag", name))?;
        self.get_tag(self.conn.last_insert_rowid())
    }

    pub fn get_tag(&self, id: i64) -> Result<Tag> {
        self.conn
            .query_row(
                &format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = ?1"),
                [id],
                tag_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("tag", id))
    }

    pub fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {TAG_COLUMNS} FROM tags WHERE name = ?1"),
                [name],
                tag_from_row,
            )
            .optional()?)
    }

    pub fn list_tags(&self, category: Option<TagCategory>) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE (?1 IS NULL OR category = ?1) ORDER BY name"
        ))?;
        let tags = stmt
            .query_map(params![category], tag_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Create a schema and all of its fields in one transaction.
    ///
    /// Field positions follow the order of `definition.fields`.
    pub fn create_schema(&self, tag_id: i64, definition: &SchemaDefinition) -> Result<DataSchema> {
        definition.validate()?;
        self.get_tag(tag_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO data_schemas (tag_id, name, version, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tag_id,
                definition.name,
                definition.version,
                definition.description,
                Utc::now()
            ],
        )
        .map_err(|e| {
            map_unique(
                e,
                "schema",
                &format!("{}@{}", definition.name, definition.version),
            )
        })?;
        let schema_id = tx.last_insert_rowid();
        for (position, field) in definition.fields.iter().enumerate() {
            insert_field(&tx, schema_id, field, position as i64)?;
        }
        tx.commit()?;

        tracing::info!(
            schema_id,
            name = %definition.name,
            version = %definition.version,
            fields = definition.fields.len(),
            "Schema created"
        );
        self.get_schema(schema_id)
    }

    /// Append a field to an existing schema.
    pub fn add_field(&self, schema_id: i64, field: &NewField) -> Result<DataField> {
        if field.name.trim().is_empty() {
            return Err(CoreError::invalid_input("name", "must not be empty"));
        }
        let schema = self.get_schema(schema_id)?;
        let position = schema.fields.iter().map(|f| f.position + 1).max().unwrap_or(0);
        let id = insert_field(&self.conn, schema_id, field, position)?;
        Ok(self.conn.query_row(
            &format!("SELECT {FIELD_COLUMNS} FROM data_fields WHERE id = ?1"),
            [id],
            field_from_row,
        )?)
    }

    /// Load a schema with its fields ordered by position.
    pub fn get_schema(&self, id: i64) -> Result<DataSchema> {
        let mut schema = self
            .conn
            .query_row(
                &format!("SELECT {SCHEMA_COLUMNS} FROM data_schemas WHERE id = ?1"),
                [id],
                schema_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("schema", id))?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FIELD_COLUMNS} FROM data_fields WHERE schema_id = ?1 ORDER BY position, id"
        ))?;
        schema.fields = stmt
            .query_map([id], field_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(schema)
    }

    /// List schemas (without fields), optionally for one tag.
    pub fn list_schemas(&self, tag_id: Option<i64>) -> Result<Vec<DataSchema>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCHEMA_COLUMNS} FROM data_schemas
             WHERE (?1 IS NULL OR tag_id = ?1) ORDER BY name, version"
        ))?;
        let schemas = stmt
            .query_map(params![tag_id], schema_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(schemas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;

    fn iris() -> SchemaDefinition {
        SchemaDefinition::new("iris", "1.0")
            .with_field(NewField::new("sepal_length", DataType::Float).required())
            .with_field(NewField::new("species", DataType::Str).required().not_null())
    }

    #[test]
    fn test_tag_crud() {
        let store = Store::open_in_memory().unwrap();
        let tag = store.create_tag("flowers", TagCategory::Dataset, "").unwrap();
        assert_eq!(store.get_tag(tag.id).unwrap().name, "flowers");
        assert_eq!(
            store.find_tag_by_name("flowers").unwrap().map(|t| t.id),
            Some(tag.id)
        );
        assert!(store.find_tag_by_name("missing").unwrap().is_none());

        store.create_tag("churn", TagCategory::MlTask, "").unwrap();
        assert_eq!(store.list_tags(None).unwrap().len(), 2);
        assert_eq!(store.list_tags(Some(TagCategory::MlTask)).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_tag_is_conflict() {
        let store = Store::open_in_memory().unwrap();
        store.create_tag("flowers", TagCategory::Dataset, "").unwrap();
        let err = store
            .create_tag("flowers", TagCategory::Analysis, "")
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_create_schema_with_fields() {
        let store = Store::open_in_memory().unwrap();
        let tag = store.create_tag("flowers", TagCategory::Dataset, "").unwrap();
        let schema = store.create_schema(tag.id, &iris()).unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].name, "sepal_length");
        assert_eq!(schema.fields[1].position, 1);
        assert!(!schema.fields[1].nullable);
        assert_eq!(schema.required_fields().count(), 2);

        let extra = store
            .add_field(schema.id, &NewField::new("petal_width", DataType::Float))
            .unwrap();
        assert_eq!(extra.position, 2);
        assert_eq!(store.get_schema(schema.id).unwrap().fields.len(), 3);
        assert_eq!(store.list_schemas(Some(tag.id)).unwrap().len(), 1);
    }

    #[test]
    fn test_schema_unique_per_tag_name_version() {
        let store = Store::open_in_memory().unwrap();
        let tag = store.create_tag("flowers", TagCategory::Dataset, "").unwrap();
        store.create_schema(tag.id, &iris()).unwrap();
        let err = store.create_schema(tag.id, &iris()).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));

        let v2 = SchemaDefinition::new("iris", "2.0");
        assert!(store.create_schema(tag.id, &v2).is_ok());
    }

    #[test]
    fn test_duplicate_field_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        let tag = store.create_tag("flowers", TagCategory::Dataset, "").unwrap();
        let schema = store.create_schema(tag.id, &iris()).unwrap();
        let err = store
            .add_field(schema.id, &NewField::new("species", DataType::Str))
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_schema_for_unknown_tag() {
        let store = Store::open_in_memory().unwrap();
        let err = store.create_schema(99, &iris()).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(store.list_schemas(None).unwrap().is_empty());
    }
}
