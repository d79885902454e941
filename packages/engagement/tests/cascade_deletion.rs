//! Integration tests for cascade deletion.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use engagement::stores::MemoryTransaction;
use engagement::testing::FaultyStore;
use engagement::{
    CascadeConfig, CascadePlanner, CascadeProgress, ChildRecord, ContentItem, ContentKind,
    DocumentStore, EngagementLedger, LedgerConfig, LedgerError, MemoryStore, RetryPolicy,
    StoreResult,
};

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(attempts)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

async fn seed_comments(store: &impl DocumentStore, content_id: &str, collection: &str, n: usize) {
    for i in 0..n {
        store
            .put_child(
                &ChildRecord::new(content_id, collection, format!("{}-{:03}", collection, i))
                    .with_owner("someone")
                    .with_body(serde_json::json!({ "text": "nice work" })),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_delete_removes_every_child_and_the_parent() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_content(&ContentItem::new("c1", ContentKind::Post).with_owner("author"))
        .await
        .unwrap();

    let ledger = EngagementLedger::new(Arc::clone(&store), LedgerConfig::default());
    ledger.add_engagement("c1", "alice").await.unwrap();
    ledger.add_engagement("c1", "bob").await.unwrap();
    ledger.remove_engagement("c1", "alice").await.unwrap();
    seed_comments(store.as_ref(), "c1", "comments", 5).await;
    seed_comments(store.as_ref(), "c1", "feedback", 2).await;

    let planner = CascadePlanner::new(
        Arc::clone(&store),
        CascadeConfig::new().with_page_size(2),
    );
    let outcome = planner.delete_content_and_children("c1").await.unwrap();

    assert_eq!(outcome.total_deleted, 8);
    assert_eq!(store.child_count("c1"), 0);

    assert!(matches!(
        ledger.repository().get("c1").await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.remove_engagement("c1", "bob").await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.add_engagement("c1", "carol").await,
        Err(LedgerError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_failed_page_stops_before_parent_and_resumes() {
    let store = FaultyStore::new(MemoryStore::new());
    store
        .put_content(&ContentItem::new("c1", ContentKind::Achievement))
        .await
        .unwrap();
    seed_comments(&store, "c1", "comments", 5).await;
    store.fail_child_deletes_after(1);
    let store = Arc::new(store);

    let planner = CascadePlanner::new(
        Arc::clone(&store),
        CascadeConfig::new().with_page_size(2).with_retry(fast_retry(2)),
    );

    let err = planner.delete_content_and_children("c1").await.unwrap_err();
    let progress = match err {
        LedgerError::PartialFailure { progress, source } => {
            assert!(matches!(*source, LedgerError::StoreUnavailable(_)));
            progress
        }
        other => panic!("expected partial failure, got {}", other),
    };

    assert_eq!(progress.content_id, "c1");
    assert_eq!(progress.completed_collections, vec!["likes".to_string()]);
    assert_eq!(progress.current_collection.as_deref(), Some("comments"));
    assert_eq!(progress.pages_completed, 1);
    assert_eq!(progress.records_deleted, 2);

    // Parent survives until every collection is empty
    assert!(store.get_content("c1").await.unwrap().is_some());
    assert_eq!(store.count_children("c1", "comments").await.unwrap(), 3);

    store.heal();
    let outcome = planner.resume(progress).await.unwrap();
    assert_eq!(outcome.total_deleted, 3);
    assert!(store.get_content("c1").await.unwrap().is_none());
    assert_eq!(store.inner().child_count("c1"), 0);
}

#[tokio::test]
async fn test_interrupted_cascade_keeps_counter_consistent() {
    let store = Arc::new(FaultyStore::new(MemoryStore::new()));
    store
        .put_content(&ContentItem::new("c1", ContentKind::Post))
        .await
        .unwrap();

    let ledger = EngagementLedger::new(Arc::clone(&store), LedgerConfig::default());
    for user in ["alice", "bob", "carol"] {
        ledger.add_engagement("c1", user).await.unwrap();
    }

    store.fail_child_deletes_after(1);
    let planner = CascadePlanner::new(
        Arc::clone(&store),
        CascadeConfig::new().with_page_size(2).with_retry(fast_retry(2)),
    );
    let err = planner.delete_content_and_children("c1").await.unwrap_err();
    assert!(matches!(err, LedgerError::PartialFailure { .. }));

    let item = store.get_content("c1").await.unwrap().unwrap();
    let records = store.count_children("c1", "likes").await.unwrap();
    assert_eq!(records, 1);
    assert_eq!(item.engagement_count, records);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_engagements_racing_a_cascade_leave_no_orphans() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_content(&ContentItem::new("c1", ContentKind::PlacementDrive))
        .await
        .unwrap();
    seed_comments(store.as_ref(), "c1", "comments", 40).await;

    let ledger = Arc::new(EngagementLedger::new(
        Arc::clone(&store),
        LedgerConfig::new().with_retry(fast_retry(64)),
    ));
    let planner = CascadePlanner::new(
        Arc::clone(&store),
        CascadeConfig::new().with_page_size(5).with_retry(fast_retry(64)),
    );

    let likers: Vec<_> = (0..20)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.add_engagement("c1", &format!("user-{}", i)).await })
        })
        .collect();

    planner.delete_content_and_children("c1").await.unwrap();

    for liker in likers {
        match liker.await.unwrap() {
            Ok(_) | Err(LedgerError::NotFound { .. }) => {}
            Err(other) => panic!("unexpected outcome: {}", other),
        }
    }

    assert!(store.get_content("c1").await.unwrap().is_none());
    assert_eq!(store.child_count("c1"), 0);
}

#[tokio::test]
async fn test_refilled_collection_is_drained_again() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_content(&ContentItem::new("c1", ContentKind::Post))
        .await
        .unwrap();
    // Written after "comments" was already reported drained
    seed_comments(store.as_ref(), "c1", "comments", 3).await;

    let planner = CascadePlanner::new(Arc::clone(&store), CascadeConfig::new().with_page_size(2));
    let mut progress = CascadeProgress::new("c1");
    progress.completed_collections = vec![
        "likes".to_string(),
        "comments".to_string(),
        "feedback".to_string(),
    ];

    let outcome = planner.resume(progress).await.unwrap();

    assert_eq!(outcome.total_deleted, 3);
    let comments = outcome
        .collections
        .iter()
        .find(|s| s.collection == "comments")
        .unwrap();
    assert_eq!(comments.pages, 2);
    assert_eq!(store.child_count("c1"), 0);
    assert!(store.get_content("c1").await.unwrap().is_none());
}

/// Writes a new comment every time the planner checks "comments" for emptiness.
struct RefillingStore {
    inner: MemoryStore,
    refills: AtomicU32,
}

#[async_trait]
impl DocumentStore for RefillingStore {
    type Txn = MemoryTransaction;

    async fn begin(&self) -> StoreResult<Self::Txn> {
        self.inner.begin().await
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
        if limit == 1 && collection == "comments" {
            let n = self.refills.fetch_add(1, Ordering::SeqCst);
            self.inner
                .put_child(&ChildRecord::new(content_id, collection, format!("late-{}", n)))
                .await?;
        }
        self.inner.list_children(content_id, collection, limit).await
    }

    async fn count_children(&self, content_id: &str, collection: &str) -> StoreResult<u64> {
        self.inner.count_children(content_id, collection).await
    }
}

#[tokio::test]
async fn test_endless_refills_exhaust_rounds_and_keep_parent() {
    let store = Arc::new(RefillingStore {
        inner: MemoryStore::new(),
        refills: AtomicU32::new(0),
    });
    store
        .put_content(&ContentItem::new("c1", ContentKind::Post))
        .await
        .unwrap();

    let planner = CascadePlanner::new(
        Arc::clone(&store),
        CascadeConfig::new().with_page_size(10).with_retry(fast_retry(3)),
    );
    let err = planner.delete_content_and_children("c1").await.unwrap_err();

    match err {
        LedgerError::PartialFailure { progress, source } => {
            assert!(matches!(*source, LedgerError::Contention { attempts: 3 }));
            assert_eq!(progress.current_collection, None);
            assert!(!progress.completed_collections.contains(&"comments".to_string()));
        }
        other => panic!("expected partial failure, got {}", other),
    }
    assert_eq!(store.refills.load(Ordering::SeqCst), 3);
    assert!(store.get_content("c1").await.unwrap().is_some());
}
