//! Fault-injecting store wrapper and fixtures shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;

use duologue_types::document::{Document, Fields, fields};
use duologue_types::error::StoreError;
use duologue_types::user::{NewUser, User, UserId};

use crate::directory::UserDirectory;
use crate::store::memory::MemoryDocumentStore;
use crate::store::{ChangeStream, CreateOutcome, DocumentStore, StoreCapabilities};

/// Memory store with switchable failures and a write counter.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryDocumentStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Live queries end with an error right after their snapshot.
    pub break_feeds: AtomicBool,
    /// Yield to the scheduler before every request, so concurrent callers
    /// interleave between their reads and writes.
    pub interleave: AtomicBool,
    /// Adds of a message with this body stall before reaching the store.
    pub slow_message: Mutex<Option<String>>,
    pub writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_transactions() -> Self {
        Self {
            inner: MemoryDocumentStore::new().without_transactions(),
            ..Self::default()
        }
    }

    pub fn interleaved(self) -> Self {
        self.interleave.store(true, Ordering::SeqCst);
        self
    }

    pub fn slow_for(self, body: &str) -> Self {
        *self.slow_message.lock().unwrap() = Some(body.to_string());
        self
    }

    fn is_slow(&self, message: &Fields) -> bool {
        let slow = self.slow_message.lock().unwrap();
        slow.as_deref()
            .is_some_and(|body| message.get(fields::MESSAGE).and_then(Value::as_str) == Some(body))
    }

    async fn pause(&self) {
        if self.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write("writes disabled".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl DocumentStore for FlakyStore {
    fn capabilities(&self) -> &StoreCapabilities {
        self.inner.capabilities()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.pause().await;
        self.check_read()?;
        self.inner.get(collection, id).await
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.pause().await;
        self.check_read()?;
        self.inner.query_equals(collection, field, value).await
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.pause().await;
        self.check_read()?;
        self.inner.query_array_contains(collection, field, value).await
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        self.pause().await;
        if self.is_slow(&fields) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.check_write()?;
        self.inner.add(collection, fields).await
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.pause().await;
        self.check_write()?;
        self.inner.set(collection, id, fields).await
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<CreateOutcome, StoreError> {
        self.pause().await;
        self.check_write()?;
        self.inner.create_if_absent(collection, id, fields).await
    }

    fn subscribe(&self, collection: &str, order_by: &str) -> ChangeStream {
        let feed = self.inner.subscribe(collection, order_by);
        if self.break_feeds.load(Ordering::SeqCst) {
            let failure = stream::once(async {
                Err(StoreError::Subscription("connection reset".into()))
            });
            return Box::pin(feed.take(1).chain(failure));
        }
        feed
    }
}

/// Register a user directly through the directory.
pub async fn register<S: DocumentStore>(
    store: &Arc<S>,
    id: &str,
    email: &str,
    username: &str,
) -> User {
    UserDirectory::new(Arc::clone(store))
        .register(NewUser {
            id: UserId::from(id),
            email: email.to_string(),
            username: username.to_string(),
        })
        .await
        .unwrap()
}
