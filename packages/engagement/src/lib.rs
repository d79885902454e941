//! Engagement Ledger
//!
//! Keeps likes, memberships and their denormalized counters correct under
//! concurrent writers without external locks, and deletes content together
//! with all of its child records.
//!
//! # Design
//!
//! - All coordination is delegated to the document store's optimistic
//!   transactions; there is no shared in-process mutable state
//! - Every check-then-write runs inside one transaction and is retried a
//!   bounded number of times on conflict
//! - The store is an injected trait, so tests run against `MemoryStore`
//! - No authorization: callers decide who may like, unlike or delete
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use engagement::{EngagementLedger, LedgerConfig, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let ledger = EngagementLedger::new(store.clone(), LedgerConfig::default());
//!
//! ledger.add_engagement("post-1", "alice").await?;
//! ledger.remove_engagement("post-1", "alice").await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Document store abstraction
//! - [`types`] - Content items, child records, configuration
//! - [`repository`] - Content accessor used by the ledger and planner
//! - [`ledger`] - Transactional add/remove engagement
//! - [`cascade`] - Paginated cascade deletion
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`testing`] - Fault-injecting store wrapper

pub mod cascade;
pub mod error;
pub mod ledger;
pub mod repository;
mod retry;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use cascade::{CascadeOutcome, CascadePlanner, CascadeProgress, CollectionSweep};
pub use error::{LedgerError, Result, StoreError, StoreResult};
pub use ledger::{EngagementChange, EngagementLedger};
pub use repository::ContentRepository;
pub use traits::store::{DocumentStore, StoreTransaction};
pub use types::{
    config::{CascadeConfig, LedgerConfig, RetryPolicy},
    content::{ChildKey, ChildRecord, ContentItem, ContentKind, EngagementRecord},
};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
