//! SQLite document store implementation.
//!
//! Implements `DocumentStore` from `duologue-core` on a single `documents`
//! table. Fields are stored as JSON text and queried with SQLite's JSON
//! functions. The `seq` column (AUTOINCREMENT) is the insertion order.
//!
//! Live queries are served in-process: every write goes through one
//! serialized section that commits on the writer pool and then publishes the
//! change on the collection's broadcast channel, so changes are reported in
//! commit order. A new subscriber registers on the channel before reading its
//! snapshot and drops live `Added` changes already covered by the snapshot.

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use sqlx::Row;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use duologue_core::store::{ChangeStream, CreateOutcome, DocumentStore, StoreCapabilities};
use duologue_types::document::{ChangeBatch, ChangeKind, Document, Fields};
use duologue_types::error::StoreError;

use super::pool::DatabasePool;

/// Default per-collection change buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// SQLite-backed implementation of `DocumentStore`.
pub struct SqliteDocumentStore {
    pool: DatabasePool,
    channels: DashMap<String, broadcast::Sender<ChangeBatch>>,
    channel_capacity: usize,
    write_lock: Mutex<()>,
    capabilities: StoreCapabilities,
}

impl SqliteDocumentStore {
    /// Create a store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self::with_capacity(pool, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a store whose live queries buffer up to `capacity` changes.
    pub fn with_capacity(pool: DatabasePool, capacity: usize) -> Self {
        Self {
            pool,
            channels: DashMap::new(),
            channel_capacity: capacity.max(1),
            write_lock: Mutex::new(()),
            capabilities: StoreCapabilities {
                transactional_create: true,
            },
        }
    }

    fn channel(&self, collection: &str) -> broadcast::Sender<ChangeBatch> {
        self.channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .clone()
    }

    fn publish(&self, collection: &str, kind: ChangeKind, document: Document) {
        if let Some(sender) = self.channels.get(collection) {
            // No receivers is fine.
            let _ = sender.send(ChangeBatch::single(kind, document));
        }
    }

    async fn insert(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
    ) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query(
            r#"INSERT INTO documents (collection, id, fields, created_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (collection, id) DO NOTHING
               RETURNING seq"#,
        )
        .bind(collection)
        .bind(id)
        .bind(encode_fields(fields)?)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        row.map(|row| {
            row.try_get::<i64, _>("seq")
                .map(|seq| seq as u64)
                .map_err(|e| StoreError::Write(e.to_string()))
        })
        .transpose()
    }

    async fn fetch_one(
        &self,
        pool: &sqlx::SqlitePool,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT id, seq, fields FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        row.map(|row| DocumentRow::from_row(&row)?.into_document())
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct DocumentRow {
    id: String,
    seq: i64,
    fields: String,
}

impl DocumentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, StoreError> {
        let read = |e: sqlx::Error| StoreError::Query(e.to_string());
        Ok(Self {
            id: row.try_get("id").map_err(read)?,
            seq: row.try_get("seq").map_err(read)?,
            fields: row.try_get("fields").map_err(read)?,
        })
    }

    fn into_document(self) -> Result<Document, StoreError> {
        let fields: Fields = serde_json::from_str(&self.fields)
            .map_err(|e| StoreError::Query(format!("invalid fields for '{}': {e}", self.id)))?;
        Ok(Document::new(self.id, self.seq as u64, fields))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn encode_fields(fields: &Fields) -> Result<String, StoreError> {
    serde_json::to_string(fields).map_err(|e| StoreError::Write(e.to_string()))
}

fn encode_value(value: &Value) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Query(e.to_string()))
}

/// JSON path of a top-level field, quoted so any field name is addressable.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn into_documents(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<Document>, StoreError> {
    rows.iter()
        .map(|row| DocumentRow::from_row(row)?.into_document())
        .collect()
}

async fn load_ordered(
    pool: &DatabasePool,
    collection: &str,
    order_by: &str,
) -> Result<Vec<Document>, StoreError> {
    let path = json_path(order_by);
    let rows = sqlx::query(
        r#"SELECT id, seq, fields FROM documents
           WHERE collection = ? AND json_type(fields, ?) = 'integer'
           ORDER BY json_extract(fields, ?) ASC, seq ASC"#,
    )
    .bind(collection)
    .bind(&path)
    .bind(&path)
    .fetch_all(&pool.reader)
    .await
    .map_err(|e| StoreError::Subscription(e.to_string()))?;

    into_documents(rows)
}

// ---------------------------------------------------------------------------
// DocumentStore implementation
// ---------------------------------------------------------------------------

impl DocumentStore for SqliteDocumentStore {
    fn capabilities(&self) -> &StoreCapabilities {
        &self.capabilities
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.fetch_one(&self.pool.reader, collection, id).await
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, seq, fields FROM documents
               WHERE collection = ? AND json_extract(fields, ?) = json_extract(?, '$')
               ORDER BY seq ASC"#,
        )
        .bind(collection)
        .bind(json_path(field))
        .bind(encode_value(value)?)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        into_documents(rows)
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let path = json_path(field);
        let rows = sqlx::query(
            r#"SELECT id, seq, fields FROM documents
               WHERE collection = ?
                 AND json_type(fields, ?) = 'array'
                 AND EXISTS (
                     SELECT 1 FROM json_each(documents.fields, ?)
                     WHERE json_each.value = json_extract(?, '$')
                 )
               ORDER BY seq ASC"#,
        )
        .bind(collection)
        .bind(&path)
        .bind(&path)
        .bind(encode_value(value)?)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        into_documents(rows)
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::now_v7().simple().to_string();
        let _guard = self.write_lock.lock().await;
        let seq = self
            .insert(collection, &id, &fields)
            .await?
            .ok_or_else(|| StoreError::Write(format!("generated id '{id}' already exists")))?;
        self.publish(collection, ChangeKind::Added, Document::new(id.clone(), seq, fields));
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(seq) = self.insert(collection, id, &fields).await? {
            self.publish(collection, ChangeKind::Added, Document::new(id, seq, fields));
            return Ok(());
        }

        let row = sqlx::query("UPDATE documents SET fields = ? WHERE collection = ? AND id = ? RETURNING seq")
            .bind(encode_fields(&fields)?)
            .bind(collection)
            .bind(id)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        let seq: i64 = row.try_get("seq").map_err(|e| StoreError::Write(e.to_string()))?;
        self.publish(collection, ChangeKind::Modified, Document::new(id, seq as u64, fields));
        Ok(())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<CreateOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(seq) = self.insert(collection, id, &fields).await? {
            self.publish(collection, ChangeKind::Added, Document::new(id, seq, fields));
            return Ok(CreateOutcome::Created);
        }

        // Unique (collection, id) rejected the insert; read the winner back.
        match self.fetch_one(&self.pool.writer, collection, id).await? {
            Some(existing) => Ok(CreateOutcome::Existing(existing)),
            None => Err(StoreError::Write(format!(
                "document '{collection}/{id}' conflicted but could not be read"
            ))),
        }
    }

    fn subscribe(&self, collection: &str, order_by: &str) -> ChangeStream {
        let mut receiver = self.channel(collection).subscribe();
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let order_by = order_by.to_string();

        Box::pin(async_stream::stream! {
            match load_ordered(&pool, &collection, &order_by).await {
                Err(e) => yield Err(e),
                Ok(snapshot) => {
                    let high_water = snapshot.iter().map(|doc| doc.seq).max().unwrap_or(0);
                    yield Ok(ChangeBatch::added(snapshot));

                    loop {
                        match receiver.recv().await {
                            Ok(mut batch) => {
                                batch.changes.retain(|change| {
                                    change.kind != ChangeKind::Added || change.document.seq > high_water
                                });
                                let batch = batch.retain_ordered_by(&order_by);
                                if !batch.is_empty() {
                                    yield Ok(batch);
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                yield Err(StoreError::Subscription(format!(
                                    "live query fell behind by {skipped} changes"
                                )));
                                break;
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        })
    }
}
