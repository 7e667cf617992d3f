//! Append-only audit log.

use super::{Store, json_column, to_json};
use crate::audit::{AuditEntry, AuditEvent, AuditQuery, TargetRef};
use crate::error::{CoreError, Result};
use chrono::Utc;
use rusqlite::{Row, params};
use serde_json::Value;

const AUDIT_COLUMNS: &str =
    "id, event_type, actor, target_type, target_id, message, payload, created_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        event_type: row.get(1)?,
        actor: row.get(2)?,
        target_type: row.get(3)?,
        target_id: row.get(4)?,
        message: row.get(5)?,
        payload: json_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

impl Store {
    /// Append an audit fact. `payload` must be a JSON object (or null).
    pub fn append_audit(
        &self,
        event: AuditEvent,
        actor: Option<&str>,
        target: TargetRef,
        message: &str,
        payload: Value,
    ) -> Result<AuditEntry> {
        let payload = match payload {
            Value::Null => Value::Object(Default::default()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(CoreError::invalid_input(
                    "payload",
                    format!("expected a JSON object, got {other}"),
                ));
            }
        };
        self.conn.execute(
            "INSERT INTO audit_log (event_type, actor, target_type, target_id, message, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event,
                actor,
                target.target_type(),
                target.id().to_string(),
                message,
                to_json(&payload)?,
                Utc::now(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(
            audit_id = id,
            event = %event,
            target = target.target_type(),
            "Audit entry appended"
        );
        Ok(self.conn.query_row(
            &format!("SELECT {AUDIT_COLUMNS} FROM audit_log WHERE id = ?1"),
            [id],
            entry_from_row,
        )?)
    }

    /// Audit entries newest first.
    pub fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let limit = query.limit.map_or(-1, |l| l as i64);
        let (target_type, target_id) = match query.target {
            Some(target) => (Some(target.target_type()), Some(target.id().to_string())),
            None => (None, None),
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log
             WHERE (?1 IS NULL OR event_type = ?1)
               AND (?2 IS NULL OR target_type = ?2)
               AND (?3 IS NULL OR target_id = ?3)
             ORDER BY created_at DESC, id DESC LIMIT ?4"
        ))?;
        let rows = stmt
            .query_map(
                params![query.event_type, target_type, target_id, limit],
                entry_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_append_and_list_newest_first() {
        let store = Store::open_in_memory().unwrap();
        store
            .append_audit(
                AuditEvent::DatasetUploaded,
                Some("ana"),
                TargetRef::Dataset(1),
                "Dataset registered",
                json!({"name": "q1"}),
            )
            .unwrap();
        store
            .append_audit(
                AuditEvent::DatasetValidated,
                None,
                TargetRef::Dataset(1),
                "Dataset validated",
                Value::Null,
            )
            .unwrap();
        store
            .append_audit(
                AuditEvent::JobExecuted,
                None,
                TargetRef::Job(1),
                "",
                json!({}),
            )
            .unwrap();

        let all = store.list_audit(&AuditQuery::default()).unwrap();
        let events: Vec<_> = all.iter().map(|e| e.event_type).collect();
        assert_eq!(
            events,
            vec![
                AuditEvent::JobExecuted,
                AuditEvent::DatasetValidated,
                AuditEvent::DatasetUploaded
            ]
        );
        assert_eq!(all[1].payload, json!({}));
        assert_eq!(all[2].actor.as_deref(), Some("ana"));

        let for_dataset = store
            .list_audit(&AuditQuery::for_target(TargetRef::Dataset(1)))
            .unwrap();
        assert_eq!(for_dataset.len(), 2);
        let limited = store
            .list_audit(&AuditQuery {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_payload_must_be_object() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .append_audit(
                AuditEvent::AnalysisRun,
                None,
                TargetRef::AnalysisRun(1),
                "",
                json!([1]),
            )
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
