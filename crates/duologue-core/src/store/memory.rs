//! In-memory implementation of [`DocumentStore`].
//!
//! Collections live in a `DashMap`. Every write and every new subscription on
//! a collection happens while holding that collection's entry, so a
//! subscriber's snapshot and its live feed never overlap or leave a gap.
//! Live changes fan out through a `tokio::sync::broadcast` channel per
//! collection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use duologue_types::document::{ChangeBatch, ChangeKind, Document, Fields, order_by_field};
use duologue_types::error::StoreError;

use super::{ChangeStream, CreateOutcome, DocumentStore, StoreCapabilities};

/// Default per-collection change buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct CollectionState {
    /// Documents in insertion order.
    docs: Vec<Document>,
    /// Document id -> position in `docs`.
    index: HashMap<String, usize>,
    changes: broadcast::Sender<ChangeBatch>,
}

impl CollectionState {
    fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            docs: Vec::new(),
            index: HashMap::new(),
            changes,
        }
    }

    fn insert(&mut self, doc: Document) {
        self.index.insert(doc.id.clone(), self.docs.len());
        self.docs.push(doc.clone());
        let _ = self.changes.send(ChangeBatch::single(ChangeKind::Added, doc));
    }

    fn replace(&mut self, position: usize, fields: Fields) {
        let doc = &mut self.docs[position];
        doc.fields = fields;
        let _ = self
            .changes
            .send(ChangeBatch::single(ChangeKind::Modified, doc.clone()));
    }

    fn get(&self, id: &str) -> Option<&Document> {
        self.index.get(id).map(|&position| &self.docs[position])
    }
}

/// Process-local document store.
///
/// Supports transactional create-if-absent unless built with
/// [`MemoryDocumentStore::without_transactions`].
pub struct MemoryDocumentStore {
    collections: DashMap<String, CollectionState>,
    next_seq: AtomicU64,
    channel_capacity: usize,
    capabilities: StoreCapabilities,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a store whose live queries buffer up to `capacity` changes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            collections: DashMap::new(),
            next_seq: AtomicU64::new(1),
            channel_capacity: capacity.max(1),
            capabilities: StoreCapabilities {
                transactional_create: true,
            },
        }
    }

    /// Disable the transactional create-if-absent primitive, reproducing a
    /// store that only offers query-then-write.
    pub fn without_transactions(mut self) -> Self {
        self.capabilities.transactional_create = false;
        self
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn filtered(&self, collection: &str, predicate: impl Fn(&Document) -> bool) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|state| state.docs.iter().filter(|d| predicate(d)).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn capabilities(&self) -> &StoreCapabilities {
        &self.capabilities
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|state| state.get(id).cloned()))
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self.filtered(collection, |doc| doc.field_equals(field, value)))
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self.filtered(collection, |doc| doc.array_contains(field, value)))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::now_v7().simple().to_string();
        let mut state = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionState::new(self.channel_capacity));
        state.insert(Document::new(id.clone(), self.next_seq(), fields));
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut state = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionState::new(self.channel_capacity));
        match state.index.get(id).copied() {
            Some(position) => state.replace(position, fields),
            None => state.insert(Document::new(id, self.next_seq(), fields)),
        }
        Ok(())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<CreateOutcome, StoreError> {
        if !self.capabilities.transactional_create {
            return Err(StoreError::Unsupported("create_if_absent"));
        }

        let mut state = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionState::new(self.channel_capacity));
        if let Some(existing) = state.get(id) {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }
        state.insert(Document::new(id, self.next_seq(), fields));
        Ok(CreateOutcome::Created)
    }

    fn subscribe(&self, collection: &str, order_by: &str) -> ChangeStream {
        let (snapshot, mut receiver) = {
            let state = self
                .collections
                .entry(collection.to_string())
                .or_insert_with(|| CollectionState::new(self.channel_capacity));
            (
                order_by_field(state.docs.clone(), order_by),
                state.changes.subscribe(),
            )
        };
        let order_by = order_by.to_string();

        Box::pin(async_stream::stream! {
            yield Ok(ChangeBatch::added(snapshot));

            loop {
                match receiver.recv().await {
                    Ok(batch) => {
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
        })
    }
}
