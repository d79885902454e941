//! Cascade deletion of a content item and every child record beneath it.
//!
//! Each configured child collection is drained page by page: list a bounded
//! page, delete it in one transaction, repeat until a page comes back empty.
//! The parent is deleted last, in a transaction that pins the parent and
//! re-checks that every collection is empty, so an engagement that lands
//! mid-cascade forces another drain round instead of leaving an orphan.
//!
//! A failed page stops the cascade with `PartialFailure`, carrying a
//! [`CascadeProgress`] that [`CascadePlanner::resume`] picks up from.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{LedgerError, Result};
use crate::repository::ContentRepository;
use crate::retry::{run_with_retry, AttemptResult};
use crate::traits::store::{DocumentStore, StoreTransaction};
use crate::types::config::CascadeConfig;
use crate::types::content::ChildKey;

/// Resume point of a cascade that stopped partway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeProgress {
    pub content_id: String,

    /// Collections confirmed empty
    pub completed_collections: Vec<String>,

    /// Collection being drained when the cascade stopped.
    ///
    /// `None` once every collection is drained and only the parent remains.
    pub current_collection: Option<String>,

    /// Pages deleted from `current_collection` so far
    pub pages_completed: u32,

    /// Child records deleted across the whole cascade so far
    pub records_deleted: u64,
}

impl CascadeProgress {
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            ..Default::default()
        }
    }

    fn is_completed(&self, collection: &str) -> bool {
        self.completed_collections.iter().any(|c| c == collection)
    }
}

/// What one collection drain removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSweep {
    pub collection: String,
    pub pages: u32,
    pub deleted: u64,
}

/// Successful cascade summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub content_id: String,
    pub collections: Vec<CollectionSweep>,
    pub total_deleted: u64,
}

enum ParentDeletion {
    Deleted,
    ChildrenRemain(Vec<String>),
}

/// Deletes content items together with all of their child records.
pub struct CascadePlanner<S> {
    repository: ContentRepository<S>,
    config: CascadeConfig,
}

impl<S: DocumentStore> CascadePlanner<S> {
    /// The counter collection is always drained, even when `config.collections`
    /// leaves it out, so a parent is never deleted under live engagement records.
    pub fn new(store: Arc<S>, mut config: CascadeConfig) -> Self {
        if let Some(counted) = config.counter_collection.clone() {
            if !config.collections.contains(&counted) {
                config.collections.push(counted);
            }
        }
        Self {
            repository: ContentRepository::new(store),
            config,
        }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Delete `content_id` and every child record in the configured collections.
    ///
    /// Fails with `NotFound` (nothing touched) if the item does not exist.
    #[instrument(skip(self))]
    pub async fn delete_content_and_children(&self, content_id: &str) -> Result<CascadeOutcome> {
        self.repository.get(content_id).await?;
        self.run(CascadeProgress::new(content_id)).await
    }

    /// Continue a cascade that returned `PartialFailure`.
    ///
    /// Does not require the parent to still exist, so orphans left by an
    /// interrupted run can always be cleaned up.
    #[instrument(skip(self, progress), fields(content_id = %progress.content_id))]
    pub async fn resume(&self, progress: CascadeProgress) -> Result<CascadeOutcome> {
        self.run(progress).await
    }

    async fn run(&self, mut progress: CascadeProgress) -> Result<CascadeOutcome> {
        let content_id = progress.content_id.clone();
        let mut sweeps: Vec<CollectionSweep> = Vec::new();
        let max_rounds = self.config.retry.max_attempts.max(1);

        for round in 1..=max_rounds {
            for collection in &self.config.collections {
                if progress.is_completed(collection) {
                    continue;
                }
                progress.current_collection = Some(collection.clone());
                progress.pages_completed = 0;

                let (pages, deleted) = self.drain(&content_id, collection, &mut progress).await?;
                record_sweep(&mut sweeps, collection, pages, deleted);

                progress.completed_collections.push(collection.clone());
                progress.current_collection = None;
            }

            match self.delete_parent(&content_id).await {
                Ok(ParentDeletion::Deleted) => {
                    let total_deleted = sweeps.iter().map(|s| s.deleted).sum();
                    info!(total_deleted, rounds = round, "content and children deleted");
                    return Ok(CascadeOutcome {
                        content_id,
                        collections: sweeps,
                        total_deleted,
                    });
                }
                Ok(ParentDeletion::ChildrenRemain(remaining)) => {
                    warn!(?remaining, round, "children written during cascade, draining again");
                    progress
                        .completed_collections
                        .retain(|c| !remaining.contains(c));
                }
                Err(err) => {
                    return Err(LedgerError::PartialFailure {
                        progress,
                        source: Box::new(err),
                    });
                }
            }
        }

        Err(LedgerError::PartialFailure {
            progress,
            source: Box::new(LedgerError::Contention {
                attempts: max_rounds,
            }),
        })
    }

    /// Delete pages from one collection until a page comes back empty.
    async fn drain(
        &self,
        content_id: &str,
        collection: &str,
        progress: &mut CascadeProgress,
    ) -> Result<(u32, u64)> {
        let mut pages = 0u32;
        let mut deleted = 0u64;

        loop {
            let page = run_with_retry(&self.config.retry, "list_children", || {
                self.try_list_page(content_id, collection)
            })
            .await;

            let keys = match page {
                Ok(keys) if keys.is_empty() => return Ok((pages, deleted)),
                Ok(keys) => keys,
                Err(err) => return Err(partial(progress, err)),
            };

            let counted = self.is_counted(collection);
            let removed = match run_with_retry(&self.config.retry, "delete_page", || {
                self.try_delete_page(content_id, &keys, counted)
            })
            .await
            {
                Ok(removed) => removed,
                Err(err) => return Err(partial(progress, err)),
            };

            pages += 1;
            deleted += removed;
            progress.pages_completed += 1;
            progress.records_deleted += removed;
            debug!(collection, page = pages, removed, "child page deleted");
        }
    }

    fn is_counted(&self, collection: &str) -> bool {
        self.config.counter_collection.as_deref() == Some(collection)
    }

    async fn try_list_page(&self, content_id: &str, collection: &str) -> AttemptResult<Vec<ChildKey>> {
        let page = self
            .repository
            .store()
            .list_children(content_id, collection, self.config.page_size.max(1))
            .await?;
        Ok(page.iter().map(|r| r.key()).collect())
    }

    /// Delete one page atomically.
    ///
    /// Each record is read first so a concurrent removal conflicts instead of
    /// being counted twice. Pages from the counter collection also decrement
    /// the parent's counter in the same transaction.
    async fn try_delete_page(&self, content_id: &str, keys: &[ChildKey], counted: bool) -> AttemptResult<u64> {
        let mut txn = self.repository.store().begin().await?;

        let mut removed = 0u64;
        for key in keys {
            if txn.get_child(key).await?.is_some() {
                txn.delete_child(key).await?;
                removed += 1;
            }
        }

        if counted && removed > 0 {
            // Parent may already be gone when resuming
            txn.apply_delta(content_id, -(removed as i64)).await?;
        }

        txn.commit().await?;
        Ok(removed)
    }

    async fn delete_parent(&self, content_id: &str) -> Result<ParentDeletion> {
        run_with_retry(&self.config.retry, "delete_parent", || {
            self.try_delete_parent(content_id)
        })
        .await
    }

    /// Delete the parent once every collection reads empty.
    ///
    /// The parent is read inside the transaction, so writers that also touch
    /// it (engagements) conflict with the delete. The emptiness check itself
    /// lists children outside the transaction: a child written by a path that
    /// never touches the parent, after its collection was checked and before
    /// the commit, is left behind.
    async fn try_delete_parent(&self, content_id: &str) -> AttemptResult<ParentDeletion> {
        let store = self.repository.store();
        let mut txn = store.begin().await?;

        // Pin the parent: an engagement committed after this read conflicts
        let exists = txn.get_content(content_id).await?.is_some();

        let mut remaining = Vec::new();
        for collection in &self.config.collections {
            if !store.list_children(content_id, collection, 1).await?.is_empty() {
                remaining.push(collection.clone());
            }
        }

        if !remaining.is_empty() {
            txn.rollback().await?;
            return Ok(ParentDeletion::ChildrenRemain(remaining));
        }

        if exists {
            txn.delete_content(content_id).await?;
            txn.commit().await?;
        } else {
            txn.rollback().await?;
        }
        Ok(ParentDeletion::Deleted)
    }
}

fn partial(progress: &CascadeProgress, err: LedgerError) -> LedgerError {
    LedgerError::PartialFailure {
        progress: progress.clone(),
        source: Box::new(err),
    }
}

fn record_sweep(sweeps: &mut Vec<CollectionSweep>, collection: &str, pages: u32, deleted: u64) {
    match sweeps.iter_mut().find(|s| s.collection == collection) {
        Some(sweep) => {
            sweep.pages += pages;
            sweep.deleted += deleted;
        }
        None => sweeps.push(CollectionSweep {
            collection: collection.to_string(),
            pages,
            deleted,
        }),
    }
}
