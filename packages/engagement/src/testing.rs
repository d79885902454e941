//! Testing utilities: a fault-injecting store wrapper.
//!
//! `FaultyStore` wraps any [`DocumentStore`] and makes its commits fail on
//! demand, so retry, contention, outage and partial-cascade paths can be
//! exercised deterministically without a real database.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{DocumentStore, StoreTransaction};
use crate::types::content::{ChildKey, ChildRecord, ContentItem};

#[derive(Default)]
struct Faults {
    /// Next N commits fail with `Conflict`
    conflicts: AtomicU32,
    /// Next N commits fail with `Unavailable`
    outages: AtomicU32,
    /// Sleep before every commit
    commit_delay_ms: AtomicU64,
    /// Remaining commits allowed to delete children; `None` = unlimited
    child_delete_budget: Mutex<Option<u32>>,
    /// Commits that reached the inner store and succeeded
    commits: AtomicU32,
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Store wrapper that injects commit failures.
pub struct FaultyStore<S> {
    inner: S,
    faults: Arc<Faults>,
}

impl<S: DocumentStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail the next `n` commits with a write conflict.
    pub fn conflict_next_commits(&self, n: u32) {
        self.faults.conflicts.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` commits as if the store were unreachable.
    pub fn fail_next_commits(&self, n: u32) {
        self.faults.outages.store(n, Ordering::SeqCst);
    }

    /// Delay every commit, e.g. to trip attempt deadlines.
    pub fn delay_commits(&self, delay: Duration) {
        self.faults
            .commit_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Allow `n` more commits that delete child records, then fail the rest.
    pub fn fail_child_deletes_after(&self, n: u32) {
        *self
            .faults
            .child_delete_budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(n);
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        self.faults.conflicts.store(0, Ordering::SeqCst);
        self.faults.outages.store(0, Ordering::SeqCst);
        self.faults.commit_delay_ms.store(0, Ordering::SeqCst);
        *self
            .faults
            .child_delete_budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of commits that went through to the inner store.
    pub fn commit_count(&self) -> u32 {
        self.faults.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FaultyStore<S> {
    type Txn = FaultyTransaction<S::Txn>;

    async fn begin(&self) -> StoreResult<Self::Txn> {
        Ok(FaultyTransaction {
            inner: self.inner.begin().await?,
            faults: Arc::clone(&self.faults),
            deletes_children: false,
        })
    }

    async fn get_content(&self, id: &str) -> StoreResult<Option<ContentItem>> {
        self.inner.get_content(id).await
    }

    async fn put_content(&self, item: &ContentItem) -> StoreResult<()> {
        self.inner.put_content(item).await
    }

    async fn put_child(&self, record: &ChildRecord) -> StoreResult<()> {
        self.inner.put_child(record).await
    }

    async fn list_children(
        &self,
        content_id: &str,
        collection: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChildRecord>> {
        self.inner.list_children(content_id, collection, limit).await
    }

    async fn count_children(&self, content_id: &str, collection: &str) -> StoreResult<u64> {
        self.inner.count_children(content_id, collection).await
    }
}

/// Transaction handed out by [`FaultyStore`].
pub struct FaultyTransaction<T> {
    inner: T,
    faults: Arc<Faults>,
    deletes_children: bool,
}

impl<T> FaultyTransaction<T> {
    fn child_delete_allowed(&self) -> bool {
        let mut budget = self
            .faults
            .child_delete_budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

#[async_trait]
impl<T: StoreTransaction> StoreTransaction for FaultyTransaction<T> {
    async fn get_content(&mut self, id: &str) -> StoreResult<Option<ContentItem>> {
        self.inner.get_content(id).await
    }

    async fn get_child(&mut self, key: &ChildKey) -> StoreResult<Option<ChildRecord>> {
        self.inner.get_child(key).await
    }

    async fn apply_delta(&mut self, content_id: &str, delta: i64) -> StoreResult<Option<u64>> {
        self.inner.apply_delta(content_id, delta).await
    }

    async fn set_count(&mut self, content_id: &str, count: u64) -> StoreResult<bool> {
        self.inner.set_count(content_id, count).await
    }

    async fn put_child(&mut self, record: &ChildRecord) -> StoreResult<()> {
        self.inner.put_child(record).await
    }

    async fn delete_child(&mut self, key: &ChildKey) -> StoreResult<()> {
        self.deletes_children = true;
        self.inner.delete_child(key).await
    }

    async fn delete_content(&mut self, id: &str) -> StoreResult<()> {
        self.inner.delete_content(id).await
    }

    async fn commit(self) -> StoreResult<()> {
        let delay = self.faults.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if take_one(&self.faults.conflicts) {
            return Err(StoreError::conflict("injected"));
        }
        if take_one(&self.faults.outages) {
            return Err(StoreError::unavailable("injected outage"));
        }
        if self.deletes_children && !self.child_delete_allowed() {
            return Err(StoreError::unavailable("injected child delete failure"));
        }

        let faults = Arc::clone(&self.faults);
        self.inner.commit().await?;
        faults.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::types::content::ContentKind;

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = FaultyStore::new(MemoryStore::new());
        store
            .put_content(&ContentItem::new("c1", ContentKind::Entry))
            .await
            .unwrap();
        store.conflict_next_commits(1);

        let mut txn = store.begin().await.unwrap();
        txn.apply_delta("c1", 1).await.unwrap();
        assert!(matches!(txn.commit().await, Err(StoreError::Conflict { .. })));

        let mut txn = store.begin().await.unwrap();
        txn.apply_delta("c1", 1).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(store.commit_count(), 1);
        assert_eq!(
            store.get_content("c1").await.unwrap().unwrap().engagement_count,
            1
        );
    }

    #[tokio::test]
    async fn test_child_delete_budget() {
        let store = FaultyStore::new(MemoryStore::new());
        for id in ["a", "b"] {
            store
                .put_child(&ChildRecord::new("c1", "comments", id))
                .await
                .unwrap();
        }
        store.fail_child_deletes_after(1);

        let mut txn = store.begin().await.unwrap();
        txn.delete_child(&ChildKey::new("c1", "comments", "a")).await.unwrap();
        txn.commit().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.delete_child(&ChildKey::new("c1", "comments", "b")).await.unwrap();
        assert!(matches!(txn.commit().await, Err(StoreError::Unavailable(_))));

        store.heal();
        let mut txn = store.begin().await.unwrap();
        txn.delete_child(&ChildKey::new("c1", "comments", "b")).await.unwrap();
        txn.commit().await.unwrap();
        assert_eq!(store.count_children("c1", "comments").await.unwrap(), 0);
    }
}
