//! Store selected by configuration.
//!
//! `[store] backend` picks between the SQLite document store and the
//! process-local memory store. Callers hold one concrete type either way.

use std::path::Path;

use serde_json::Value;

use duologue_core::store::memory::MemoryDocumentStore;
use duologue_core::store::{ChangeStream, CreateOutcome, DocumentStore, StoreCapabilities};
use duologue_types::config::{StoreBackend, StoreConfig};
use duologue_types::document::{Document, Fields};
use duologue_types::error::StoreError;

use crate::sqlite::document::SqliteDocumentStore;
use crate::sqlite::pool::{DatabasePool, database_url};

pub enum ConfiguredStore {
    Sqlite(SqliteDocumentStore),
    Memory(MemoryDocumentStore),
}

impl ConfiguredStore {
    /// Open the configured backend. The SQLite database lives in `data_dir`,
    /// which is created if needed.
    pub async fn open(config: &StoreConfig, data_dir: &Path) -> Result<Self, sqlx::Error> {
        match config.backend {
            StoreBackend::Sqlite => {
                tokio::fs::create_dir_all(data_dir).await?;
                let pool = DatabasePool::new(&database_url(data_dir)).await?;
                tracing::debug!(data_dir = %data_dir.display(), "opened sqlite document store");
                Ok(Self::Sqlite(SqliteDocumentStore::with_capacity(
                    pool,
                    config.subscription_capacity,
                )))
            }
            StoreBackend::Memory => {
                tracing::debug!("using in-memory document store");
                Ok(Self::Memory(MemoryDocumentStore::with_capacity(
                    config.subscription_capacity,
                )))
            }
        }
    }

    pub fn backend(&self) -> StoreBackend {
        match self {
            Self::Sqlite(_) => StoreBackend::Sqlite,
            Self::Memory(_) => StoreBackend::Memory,
        }
    }
}

impl DocumentStore for ConfiguredStore {
    fn capabilities(&self) -> &StoreCapabilities {
        match self {
            Self::Sqlite(store) => store.capabilities(),
            Self::Memory(store) => store.capabilities(),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        match self {
            Self::Sqlite(store) => store.get(collection, id).await,
            Self::Memory(store) => store.get(collection, id).await,
        }
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        match self {
            Self::Sqlite(store) => store.query_equals(collection, field, value).await,
            Self::Memory(store) => store.query_equals(collection, field, value).await,
        }
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        match self {
            Self::Sqlite(store) => store.query_array_contains(collection, field, value).await,
            Self::Memory(store) => store.query_array_contains(collection, field, value).await,
        }
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        match self {
            Self::Sqlite(store) => store.add(collection, fields).await,
            Self::Memory(store) => store.add(collection, fields).await,
        }
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.set(collection, id, fields).await,
            Self::Memory(store) => store.set(collection, id, fields).await,
        }
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<CreateOutcome, StoreError> {
        match self {
            Self::Sqlite(store) => store.create_if_absent(collection, id, fields).await,
            Self::Memory(store) => store.create_if_absent(collection, id, fields).await,
        }
    }

    fn subscribe(&self, collection: &str, order_by: &str) -> ChangeStream {
        match self {
            Self::Sqlite(store) => store.subscribe(collection, order_by),
            Self::Memory(store) => store.subscribe(collection, order_by),
        }
    }
}
