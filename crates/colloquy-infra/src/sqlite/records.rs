//! SQLite record store implementation.
//!
//! Implements `RecordStore` from `colloquy-core`. Payloads are stored as
//! JSON text; one row per `(owner_id, agent_id, kind)`.

use chrono::{DateTime, Utc};
use colloquy_core::storage::RecordStore;
use colloquy_types::error::RepositoryError;
use colloquy_types::storage::{RecordFilter, RecordKind, StoredRecord};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `RecordStore`.
pub struct SqliteRecordStore {
    pool: DatabasePool,
}

impl SqliteRecordStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RecordRow {
    owner_id: String,
    agent_id: String,
    kind: String,
    payload: String,
    updated_at: String,
}

impl RecordRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            owner_id: row.try_get("owner_id")?,
            agent_id: row.try_get("agent_id")?,
            kind: row.try_get("kind")?,
            payload: row.try_get("payload")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<StoredRecord, RepositoryError> {
        let kind: RecordKind = self.kind.parse().map_err(RepositoryError::Query)?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)
            .map_err(|e| RepositoryError::Query(format!("invalid JSON payload: {e}")))?;
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;

        Ok(StoredRecord {
            owner_id: self.owner_id,
            agent_id: self.agent_id,
            kind,
            payload,
            updated_at,
        })
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// RecordStore implementation
// ---------------------------------------------------------------------------

impl RecordStore for SqliteRecordStore {
    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), RepositoryError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        for record in records {
            let payload = serde_json::to_string(&record.payload)
                .map_err(|e| RepositoryError::Query(format!("failed to serialize payload: {e}")))?;
            sqlx::query(
                r#"INSERT INTO records (owner_id, agent_id, kind, payload, updated_at)
                   VALUES (?, ?, ?, ?, ?)
                   ON CONFLICT (owner_id, agent_id, kind)
                   DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at"#,
            )
            .bind(&record.owner_id)
            .bind(&record.agent_id)
            .bind(record.kind.to_string())
            .bind(payload)
            .bind(record.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }
        tx.commit().await.map_err(query_err)?;

        tracing::trace!(count = records.len(), "records upserted");
        Ok(())
    }

    async fn get_all(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>, RepositoryError> {
        let kind = filter.kind.map(|k| k.to_string());
        let rows = sqlx::query(
            r#"SELECT owner_id, agent_id, kind, payload, updated_at FROM records
               WHERE owner_id = ?
                 AND (? IS NULL OR agent_id = ?)
                 AND (? IS NULL OR kind = ?)
               ORDER BY agent_id, kind"#,
        )
        .bind(&filter.owner_id)
        .bind(&filter.agent_id)
        .bind(&filter.agent_id)
        .bind(&kind)
        .bind(&kind)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| {
                RecordRow::from_row(row)
                    .map_err(query_err)
                    .and_then(RecordRow::into_record)
            })
            .collect()
    }

    async fn delete_all(&self, filter: &RecordFilter) -> Result<u64, RepositoryError> {
        let kind = filter.kind.map(|k| k.to_string());
        let result = sqlx::query(
            r#"DELETE FROM records
               WHERE owner_id = ?
                 AND (? IS NULL OR agent_id = ?)
                 AND (? IS NULL OR kind = ?)"#,
        )
        .bind(&filter.owner_id)
        .bind(&filter.agent_id)
        .bind(&filter.agent_id)
        .bind(&kind)
        .bind(&kind)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::storage::SESSION_SCOPE;
    use serde_json::json;

    async fn store() -> (SqliteRecordStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        (SqliteRecordStore::new(pool), dir)
    }

    fn record(owner: &str, agent: &str, kind: RecordKind, payload: serde_json::Value) -> StoredRecord {
        StoredRecord::new(owner, agent, kind, payload)
    }

    #[tokio::test]
    async fn upsert_overwrites_by_key() {
        let (store, _dir) = store().await;
        store
            .upsert(&[record("u1", "agent_1", RecordKind::Memory, json!({"v": 1}))])
            .await
            .unwrap();
        store
            .upsert(&[record("u1", "agent_1", RecordKind::Memory, json!({"v": 2}))])
            .await
            .unwrap();

        let all = store.get_all(&RecordFilter::owner("u1")).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload, json!({"v": 2}));
    }

    #[tokio::test]
    async fn filters_narrow_by_agent_and_kind() {
        let (store, _dir) = store().await;
        store
            .upsert(&[
                record("u1", "agent_1", RecordKind::Memory, json!({})),
                record("u1", "agent_1", RecordKind::RetrievalDocuments, json!([])),
                record("u1", "agent_2", RecordKind::Memory, json!({})),
                record("u1", SESSION_SCOPE, RecordKind::TopicState, json!({})),
                record("u2", "agent_1", RecordKind::Memory, json!({})),
            ])
            .await
            .unwrap();

        let owner = store.get_all(&RecordFilter::owner("u1")).await.unwrap();
        assert_eq!(owner.len(), 4);

        let agent = store
            .get_all(&RecordFilter::owner("u1").agent("agent_1"))
            .await
            .unwrap();
        assert_eq!(agent.len(), 2);

        let memories = store
            .get_all(&RecordFilter::owner("u1").kind(RecordKind::Memory))
            .await
            .unwrap();
        assert_eq!(memories.len(), 2);
        assert!(memories.iter().all(|r| r.kind == RecordKind::Memory));
    }

    #[tokio::test]
    async fn delete_all_is_scoped_to_owner() {
        let (store, _dir) = store().await;
        store
            .upsert(&[
                record("u1", "agent_1", RecordKind::Memory, json!({})),
                record("u1", "agent_2", RecordKind::Memory, json!({})),
                record("u2", "agent_1", RecordKind::Memory, json!({})),
            ])
            .await
            .unwrap();

        let removed = store.delete_all(&RecordFilter::owner("u1")).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_all(&RecordFilter::owner("u1")).await.unwrap().is_empty());
        assert_eq!(store.get_all(&RecordFilter::owner("u2")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_upsert_is_noop() {
        let (store, _dir) = store().await;
        store.upsert(&[]).await.unwrap();
        assert!(store.get_all(&RecordFilter::owner("u1")).await.unwrap().is_empty());
    }
}
