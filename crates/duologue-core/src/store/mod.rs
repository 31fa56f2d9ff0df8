//! DocumentStore trait definition (port).
//!
//! The chat core never talks to a database directly. It consumes this
//! contract: point reads, equality and array-contains queries, writes, an
//! optional transactional create-if-absent, and ordered live subscriptions.
//! Implementations live here (`memory`) and in duologue-infra (SQLite).

pub mod codec;
pub mod memory;

use std::pin::Pin;

use futures_util::Stream;
use serde_json::Value;

use duologue_types::document::{ChangeBatch, Document, Fields};
use duologue_types::error::StoreError;

/// Live change feed of one ordered query. Dropping it tears the query down.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<ChangeBatch, StoreError>> + Send + 'static>>;

/// What a store supports beyond the base contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// `create_if_absent` is atomic: of several concurrent calls for the same
    /// `(collection, id)` exactly one observes `Created`.
    pub transactional_create: bool,
}

/// Result of [`DocumentStore::create_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created,
    /// A document with that id already existed and was left untouched.
    Existing(Document),
}

/// Trait for document store backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition) for the request
/// operations. `subscribe` returns a boxed stream so feeds can be held in
/// struct fields and dropped independently of the store.
///
/// Query results come back in store insertion order.
pub trait DocumentStore: Send + Sync {
    fn capabilities(&self) -> &StoreCapabilities;

    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Documents whose `field` equals `value`.
    fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> impl std::future::Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Documents whose array `field` contains `value`.
    fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> impl std::future::Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Insert a document under a store-assigned id and return that id.
    fn add(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<String, StoreError>> + Send;

    /// Create or overwrite the document at `id`.
    fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Insert at `id` only if nothing is stored there yet.
    ///
    /// Stores without `transactional_create` return `StoreError::Unsupported`.
    fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<CreateOutcome, StoreError>> + Send;

    /// Live query over `collection` ordered by the integer field `order_by`
    /// ascending (ties broken by insertion sequence).
    ///
    /// The first batch is the snapshot of existing documents; later batches
    /// report changes in the order the store applied them.
    fn subscribe(&self, collection: &str, order_by: &str) -> ChangeStream;
}
