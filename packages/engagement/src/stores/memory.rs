//! In-memory document store for testing and development.
//!
//! Transactions are optimistic: every read records the version it observed,
//! writes are buffered, and commit validates the read set under a single lock
//! before applying the writes. A document that was absent when read must still
//! be absent at commit.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{DocumentStore, StoreTransaction};
use crate::types::content::{ChildKey, ChildRecord, ContentItem};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DocKey {
    Content(String),
    Child(ChildKey),
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocKey::Content(id) => write!(f, "content/{}", id),
            DocKey::Child(key) => key.fmt(f),
        }
    }
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Content(ContentItem),
    Child(ChildRecord),
    Delete,
}

#[derive(Debug, Clone)]
struct VersionedChild {
    record: ChildRecord,
    version: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Content items; `ContentItem::version` doubles as the conflict version
    contents: HashMap<String, ContentItem>,
    /// Ordered so one collection under one parent is a contiguous range
    children: BTreeMap<ChildKey, VersionedChild>,
    /// Global version sequence, so a re-created document never reuses a version
    sequence: u64,
}

impl MemoryState {
    fn next_version(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn version_of(&self, key: &DocKey) -> Option<u64> {
        match key {
            DocKey::Content(id) => self.contents.get(id).map(|c| c.version),
            DocKey::Child(key) => self.children.get(key).map(|c| c.version),
        }
    }

    fn write_content(&mut self, mut item: ContentItem) {
        item.version = self.next_version();
        item.updated_at = Utc::now();
        self.contents.insert(item.id.clone(), item);
    }

    fn write_child(&mut self, record: ChildRecord) {
        let version = self.next_version();
        self.children
            .insert(record.key(), VersionedChild { record, version });
    }

    fn collection_range<'a>(
        &'a self,
        content_id: &'a str,
        collection: &'a str,
    ) -> impl Iterator<Item = &'a VersionedChild> + 'a {
        let start = ChildKey::new(content_id, collection, "");
        self.children
            .range(start..)
            .take_while(move |(k, _)| k.content_id == content_id && k.collection == collection)
            .map(|(_, v)| v)
    }
}

/// In-memory storage for content items and child records.
///
/// Cloning is cheap and shares the underlying data. Not suitable for
/// production as data is lost on restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.contents.clear();
        state.children.clear();
    }

    /// Number of stored content items.
    pub fn content_count(&self) -> usize {
        self.lock().contents.len()
    }

    /// Number of child records under a content item, across all collections.
    pub fn child_count(&self, content_id: &str) -> usize {
        self.lock()
            .children
            .keys()
            .filter(|k| k.content_id == content_id)
            .count()
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    type Txn = MemoryTransaction;

    async fn begin(&self) -> StoreResult<MemoryTransaction> {
        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            reads: HashMap::new(),
            writes: Vec::new(),
        })
    }

    async fn get_content(&self, id: &str) -> StoreResult<Option<ContentItem>> {
        Ok(self.lock().contents.get(id).cloned())
    }

    async fn put_content(&self, item: &ContentItem) -> StoreResult<()> {
        self.lock().write_content(item.clone());
        Ok(())
    }

    async fn put_child(&self, record: &ChildRecord) -> StoreResult<()> {
        self.lock().write_child(record.clone());
        Ok(())
    }

    async fn list_children(
        &self,
        content_id: &str,
        collection: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChildRecord>> {
        Ok(self
            .lock()
            .collection_range(content_id, collection)
            .take(limit)
            .map(|v| v.record.clone())
            .collect())
    }

    async fn count_children(&self, content_id: &str, collection: &str) -> StoreResult<u64> {
        Ok(self.lock().collection_range(content_id, collection).count() as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Transaction over a [`MemoryStore`].
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    /// First observed version per document (`None` = absent)
    reads: HashMap<DocKey, Option<u64>>,
    /// Buffered writes in issue order
    writes: Vec<(DocKey, PendingWrite)>,
}

impl MemoryTransaction {
    fn pending(&self, key: &DocKey) -> Option<&PendingWrite> {
        self.writes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, w)| w)
    }

    /// Read through the buffer, then the shared state, recording the version.
    async fn read_content(&mut self, id: &str) -> Option<ContentItem> {
        let key = DocKey::Content(id.to_string());
        if let Some(write) = self.pending(&key) {
            return match write {
                PendingWrite::Content(item) => Some(item.clone()),
                _ => None,
            };
        }

        let item = {
            let state = lock_state(&self.state);
            let item = state.contents.get(id).cloned();
            self.reads
                .entry(key)
                .or_insert_with(|| item.as_ref().map(|c| c.version));
            item
        };

        // Let other tasks run between reads and commit, like a network round trip
        tokio::task::yield_now().await;
        item
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get_content(&mut self, id: &str) -> StoreResult<Option<ContentItem>> {
        Ok(self.read_content(id).await)
    }

    async fn get_child(&mut self, key: &ChildKey) -> StoreResult<Option<ChildRecord>> {
        let doc_key = DocKey::Child(key.clone());
        if let Some(write) = self.pending(&doc_key) {
            return Ok(match write {
                PendingWrite::Child(record) => Some(record.clone()),
                _ => None,
            });
        }

        let record = {
            let state = lock_state(&self.state);
            let versioned = state.children.get(key).cloned();
            self.reads
                .entry(doc_key)
                .or_insert_with(|| versioned.as_ref().map(|v| v.version));
            versioned.map(|v| v.record)
        };

        tokio::task::yield_now().await;
        Ok(record)
    }

    async fn apply_delta(&mut self, content_id: &str, delta: i64) -> StoreResult<Option<u64>> {
        let Some(mut item) = self.read_content(content_id).await else {
            return Ok(None);
        };
        item.engagement_count = if delta < 0 {
            item.engagement_count.saturating_sub(delta.unsigned_abs())
        } else {
            item.engagement_count.saturating_add(delta as u64)
        };
        let count = item.engagement_count;
        self.writes.push((
            DocKey::Content(content_id.to_string()),
            PendingWrite::Content(item),
        ));
        Ok(Some(count))
    }

    async fn set_count(&mut self, content_id: &str, count: u64) -> StoreResult<bool> {
        let Some(mut item) = self.read_content(content_id).await else {
            return Ok(false);
        };
        item.engagement_count = count;
        self.writes.push((
            DocKey::Content(content_id.to_string()),
            PendingWrite::Content(item),
        ));
        Ok(true)
    }

    async fn put_child(&mut self, record: &ChildRecord) -> StoreResult<()> {
        self.writes.push((
            DocKey::Child(record.key()),
            PendingWrite::Child(record.clone()),
        ));
        Ok(())
    }

    async fn delete_child(&mut self, key: &ChildKey) -> StoreResult<()> {
        self.writes
            .push((DocKey::Child(key.clone()), PendingWrite::Delete));
        Ok(())
    }

    async fn delete_content(&mut self, id: &str) -> StoreResult<()> {
        self.writes
            .push((DocKey::Content(id.to_string()), PendingWrite::Delete));
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        let mut state = lock_state(&self.state);

        for (key, observed) in &self.reads {
            if state.version_of(key) != *observed {
                return Err(StoreError::conflict(key.to_string()));
            }
        }

        for (key, write) in self.writes {
            match (key, write) {
                (_, PendingWrite::Content(item)) => state.write_content(item),
                (_, PendingWrite::Child(record)) => state.write_child(record),
                (DocKey::Content(id), PendingWrite::Delete) => {
                    state.contents.remove(&id);
                }
                (DocKey::Child(key), PendingWrite::Delete) => {
                    state.children.remove(&key);
                }
            }
        }

        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}
