//! Content repository: the only accessor the ledger and planner use for
//! content documents.

use std::sync::Arc;

use crate::error::{LedgerError, Result};
use crate::traits::store::{DocumentStore, StoreTransaction};
use crate::types::content::ContentItem;

/// Fetches content items and applies counter deltas inside a caller's transaction.
pub struct ContentRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for ContentRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> ContentRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Point read of a content item.
    pub async fn get(&self, content_id: &str) -> Result<ContentItem> {
        self.store
            .get_content(content_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(content_id))
    }

    /// Read a content item inside `txn`, pinning it for conflict detection.
    pub async fn get_in(&self, content_id: &str, txn: &mut S::Txn) -> Result<ContentItem> {
        txn.get_content(content_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(content_id))
    }

    /// Add `delta` to the engagement count inside `txn`, clamped at zero.
    ///
    /// Returns the new count.
    pub async fn apply_delta(&self, content_id: &str, delta: i64, txn: &mut S::Txn) -> Result<u64> {
        txn.apply_delta(content_id, delta)
            .await?
            .ok_or_else(|| LedgerError::not_found(content_id))
    }

    /// Overwrite the engagement count inside `txn`.
    pub async fn set_count(&self, content_id: &str, count: u64, txn: &mut S::Txn) -> Result<()> {
        if txn.set_count(content_id, count).await? {
            Ok(())
        } else {
            Err(LedgerError::not_found(content_id))
        }
    }
}
