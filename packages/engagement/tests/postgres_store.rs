//! PostgreSQL store tests.
//!
//! Start a throwaway Postgres with testcontainers. Needs Docker:
//! `cargo test -p engagement --features postgres -- --ignored`

#![cfg(feature = "postgres")]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use engagement::{
    CascadeConfig, CascadePlanner, ChildRecord, ContentItem, ContentKind, DocumentStore,
    EngagementLedger, LedgerConfig, LedgerError, PostgresStore, RetryPolicy,
};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

async fn start_store() -> Result<(ContainerAsync<Postgres>, Arc<PostgresStore>)> {
    let postgres = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .context("Failed to start Postgres container")?;

    let host = postgres.get_host().await?;
    let port = postgres.get_host_port_ipv4(5432).await?;
    let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    let store = PostgresStore::new(&url)
        .await
        .context("Failed to connect to Postgres")?;
    Ok((postgres, Arc::new(store)))
}

fn racing_config() -> LedgerConfig {
    LedgerConfig::new().with_retry(
        RetryPolicy::new()
            .with_max_attempts(40)
            .with_backoff(Duration::from_millis(2), Duration::from_millis(50)),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires docker"]
async fn test_postgres_concurrent_distinct_adds() -> Result<()> {
    let (_container, store) = start_store().await?;
    store
        .put_content(&ContentItem::new("c1", ContentKind::Post))
        .await?;
    let ledger = Arc::new(EngagementLedger::new(Arc::clone(&store), racing_config()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.add_engagement("c1", &format!("u{}", i)).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    let item = store.get_content("c1").await?.context("content missing")?;
    assert_eq!(item.engagement_count, 8);
    assert_eq!(store.count_children("c1", "likes").await?, 8);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires docker"]
async fn test_postgres_duplicate_add_and_cascade() -> Result<()> {
    let (_container, store) = start_store().await?;
    store
        .put_content(&ContentItem::new("c1", ContentKind::Entry).with_owner("author"))
        .await?;
    for i in 0..5 {
        store
            .put_child(&ChildRecord::new("c1", "comments", format!("k{}", i)))
            .await?;
    }

    let ledger = EngagementLedger::new(Arc::clone(&store), racing_config());
    ledger.add_engagement("c1", "alice").await?;
    assert!(matches!(
        ledger.add_engagement("c1", "alice").await,
        Err(LedgerError::AlreadyEngaged { .. })
    ));
    assert!(matches!(
        ledger.remove_engagement("c1", "bob").await,
        Err(LedgerError::NotEngaged { .. })
    ));

    let planner = CascadePlanner::new(Arc::clone(&store), CascadeConfig::new().with_page_size(2));
    let outcome = planner.delete_content_and_children("c1").await?;
    assert_eq!(outcome.total_deleted, 6);
    assert!(store.get_content("c1").await?.is_none());
    assert!(matches!(
        ledger.remove_engagement("c1", "alice").await,
        Err(LedgerError::NotFound { .. })
    ));
    Ok(())
}
