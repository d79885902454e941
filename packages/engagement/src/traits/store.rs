//! Document store traits.
//!
//! The store is split into two traits:
//! - `DocumentStore`: point reads, independent write paths, paginated listing
//! - `StoreTransaction`: an optimistic read/write unit with atomic commit
//!
//! Every check-then-write in this crate happens inside one `StoreTransaction`.
//! A commit fails with [`StoreError::Conflict`](crate::error::StoreError::Conflict)
//! when another commit changed a document the transaction read.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::content::{ChildKey, ChildRecord, ContentItem};

/// A transactional document store holding content items and their children.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Transaction handle produced by [`begin`](DocumentStore::begin).
    type Txn: StoreTransaction;

    /// Start a new transaction.
    async fn begin(&self) -> StoreResult<Self::Txn>;

    /// Read a content item outside any transaction.
    async fn get_content(&self, id: &str) -> StoreResult<Option<ContentItem>>;

    /// Create or replace a content item.
    ///
    /// This is the write path of whichever subsystem owns the item; the
    /// ledger never calls it.
    async fn put_content(&self, item: &ContentItem) -> StoreResult<()>;

    /// Write a child record through an independent path (comments, feedback).
    async fn put_child(&self, record: &ChildRecord) -> StoreResult<()>;

    /// List up to `limit` children of one collection, ordered by record id.
    async fn list_children(
        &self,
        content_id: &str,
        collection: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChildRecord>>;

    /// Count the children of one collection.
    async fn count_children(&self, content_id: &str, collection: &str) -> StoreResult<u64>;

    /// Whether the store is reachable.
    async fn ping(&self) -> StoreResult<()> {
        self.get_content("__ping__").await.map(|_| ())
    }
}

/// One optimistic transaction.
///
/// Reads are recorded; writes become visible only on [`commit`](StoreTransaction::commit).
/// Dropping a transaction without committing discards it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Read a content item inside the transaction.
    async fn get_content(&mut self, id: &str) -> StoreResult<Option<ContentItem>>;

    /// Read a child record inside the transaction.
    async fn get_child(&mut self, key: &ChildKey) -> StoreResult<Option<ChildRecord>>;

    /// Add `delta` to an item's engagement count, clamped at zero.
    ///
    /// Returns the new count, or `None` if the item does not exist.
    async fn apply_delta(&mut self, content_id: &str, delta: i64) -> StoreResult<Option<u64>>;

    /// Overwrite an item's engagement count.
    ///
    /// Returns `false` if the item does not exist.
    async fn set_count(&mut self, content_id: &str, count: u64) -> StoreResult<bool>;

    async fn put_child(&mut self, record: &ChildRecord) -> StoreResult<()>;

    async fn delete_child(&mut self, key: &ChildKey) -> StoreResult<()>;

    async fn delete_content(&mut self, id: &str) -> StoreResult<()>;

    /// Atomically apply every write, or none.
    async fn commit(self) -> StoreResult<()>;

    /// Discard the transaction.
    async fn rollback(self) -> StoreResult<()>;
}
