//! The engagement ledger.
//!
//! Adds and removes one user's engagement on a content item and keeps the
//! item's denormalized `engagement_count` equal to the number of engagement
//! records beneath it.
//!
//! Every operation is a single check-then-write transaction: the content item
//! and the `(content_id, user_id)` record are read inside the transaction that
//! writes them, and the store's conflict detection rejects whichever concurrent
//! writer commits second. The loser re-runs the same logic from scratch, so a
//! duplicate add resolves to `AlreadyEngaged` and two distinct users both land.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{LedgerError, Result};
use crate::repository::ContentRepository;
use crate::retry::{run_with_retry, AttemptError, AttemptResult};
use crate::traits::store::{DocumentStore, StoreTransaction};
use crate::types::config::LedgerConfig;
use crate::types::content::{ChildKey, EngagementRecord};

/// A committed engagement change and the counter value it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementChange {
    pub content_id: String,
    pub user_id: String,
    pub engagement_count: u64,
}

/// Transactional like/unlike engine over a [`DocumentStore`].
pub struct EngagementLedger<S> {
    repository: ContentRepository<S>,
    config: LedgerConfig,
}

impl<S: DocumentStore> EngagementLedger<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            repository: ContentRepository::new(store),
            config,
        }
    }

    pub fn repository(&self) -> &ContentRepository<S> {
        &self.repository
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn record_key(&self, content_id: &str, user_id: &str) -> ChildKey {
        ChildKey::new(content_id, &self.config.engagement_collection, user_id)
    }

    /// Record that `user_id` engaged with `content_id`.
    ///
    /// Fails with `NotFound` if the item is missing, `AlreadyEngaged` if the
    /// record exists, `Contention` if conflicting writers exhaust the attempts.
    #[instrument(skip(self))]
    pub async fn add_engagement(&self, content_id: &str, user_id: &str) -> Result<EngagementChange> {
        let change = run_with_retry(&self.config.retry, "add_engagement", || {
            self.try_add(content_id, user_id)
        })
        .await?;

        info!(count = change.engagement_count, "engagement added");
        Ok(change)
    }

    async fn try_add(&self, content_id: &str, user_id: &str) -> AttemptResult<EngagementChange> {
        let mut txn = self.repository.store().begin().await?;

        self.repository.get_in(content_id, &mut txn).await?;

        if txn.get_child(&self.record_key(content_id, user_id)).await?.is_some() {
            txn.rollback().await?;
            debug!("already engaged");
            return Err(AttemptError::NonRetryable(LedgerError::AlreadyEngaged {
                content_id: content_id.to_string(),
                user_id: user_id.to_string(),
            }));
        }

        let record = EngagementRecord::new(content_id, user_id)
            .into_child(&self.config.engagement_collection);
        txn.put_child(&record).await?;
        let engagement_count = self.repository.apply_delta(content_id, 1, &mut txn).await?;
        txn.commit().await?;

        Ok(EngagementChange {
            content_id: content_id.to_string(),
            user_id: user_id.to_string(),
            engagement_count,
        })
    }

    /// Remove `user_id`'s engagement from `content_id`.
    ///
    /// The counter is decremented but never below zero. Fails with
    /// `NotFound`, `NotEngaged` or `Contention`.
    #[instrument(skip(self))]
    pub async fn remove_engagement(&self, content_id: &str, user_id: &str) -> Result<EngagementChange> {
        let change = run_with_retry(&self.config.retry, "remove_engagement", || {
            self.try_remove(content_id, user_id)
        })
        .await?;

        info!(count = change.engagement_count, "engagement removed");
        Ok(change)
    }

    async fn try_remove(&self, content_id: &str, user_id: &str) -> AttemptResult<EngagementChange> {
        let mut txn = self.repository.store().begin().await?;

        self.repository.get_in(content_id, &mut txn).await?;

        let key = self.record_key(content_id, user_id);
        if txn.get_child(&key).await?.is_none() {
            txn.rollback().await?;
            debug!("not engaged");
            return Err(AttemptError::NonRetryable(LedgerError::NotEngaged {
                content_id: content_id.to_string(),
                user_id: user_id.to_string(),
            }));
        }

        txn.delete_child(&key).await?;
        let engagement_count = self.repository.apply_delta(content_id, -1, &mut txn).await?;
        txn.commit().await?;

        Ok(EngagementChange {
            content_id: content_id.to_string(),
            user_id: user_id.to_string(),
            engagement_count,
        })
    }

    /// Whether `user_id` currently has an engagement record on `content_id`.
    #[instrument(skip(self))]
    pub async fn has_engaged(&self, content_id: &str, user_id: &str) -> Result<bool> {
        run_with_retry(&self.config.retry, "has_engaged", || {
            self.try_has_engaged(content_id, user_id)
        })
        .await
    }

    async fn try_has_engaged(&self, content_id: &str, user_id: &str) -> AttemptResult<bool> {
        let mut txn = self.repository.store().begin().await?;
        self.repository.get_in(content_id, &mut txn).await?;
        let engaged = txn
            .get_child(&self.record_key(content_id, user_id))
            .await?
            .is_some();
        txn.rollback().await?;
        Ok(engaged)
    }

    /// Rewrite a drifted counter to the true number of engagement records.
    ///
    /// The item is read first inside the transaction, so any like or unlike
    /// that commits before this transaction does bumps the item and forces a
    /// retry with a fresh count. Returns the reconciled count.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, content_id: &str) -> Result<u64> {
        run_with_retry(&self.config.retry, "reconcile", || self.try_reconcile(content_id)).await
    }

    async fn try_reconcile(&self, content_id: &str) -> AttemptResult<u64> {
        let store = self.repository.store();
        let mut txn = store.begin().await?;

        let item = self.repository.get_in(content_id, &mut txn).await?;
        let actual = store
            .count_children(content_id, &self.config.engagement_collection)
            .await?;

        if item.engagement_count == actual {
            txn.rollback().await?;
            return Ok(actual);
        }

        self.repository.set_count(content_id, actual, &mut txn).await?;
        txn.commit().await?;

        info!(
            stored = item.engagement_count,
            actual, "engagement counter reconciled"
        );
        Ok(actual)
    }
}
