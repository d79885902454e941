//! Typed errors for the engagement library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so request handlers can
//! match on the outcome and translate it to their own transport.

use thiserror::Error;

use crate::cascade::CascadeProgress;

/// Outcomes of ledger and cascade operations that are not a success.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Referenced content item does not exist
    #[error("content not found: {content_id}")]
    NotFound { content_id: String },

    /// The user already has an engagement record on this content
    #[error("user {user_id} already engaged with {content_id}")]
    AlreadyEngaged { content_id: String, user_id: String },

    /// The user has no engagement record on this content
    #[error("user {user_id} has not engaged with {content_id}")]
    NotEngaged { content_id: String, user_id: String },

    /// Transaction attempts exhausted by concurrent writers.
    ///
    /// Says nothing about the final state; the whole operation may be retried.
    #[error("gave up after {attempts} conflicting attempts")]
    Contention { attempts: u32 },

    /// Cascade deletion stopped partway; `progress` is the resume point
    #[error(
        "cascade deletion of {} stopped at {}: {source}",
        .progress.content_id,
        .progress.current_collection.as_deref().unwrap_or("parent")
    )]
    PartialFailure {
        progress: CascadeProgress,
        #[source]
        source: Box<LedgerError>,
    },

    /// Document store unreachable or failing
    #[error("document store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl LedgerError {
    /// Whether repeating the whole operation later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Contention { .. } | LedgerError::StoreUnavailable(_)
        )
    }

    pub(crate) fn not_found(content_id: &str) -> Self {
        LedgerError::NotFound {
            content_id: content_id.to_string(),
        }
    }
}

/// Errors raised by a [`DocumentStore`](crate::traits::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another transaction committed a change to a document this one read
    #[error("write conflict on {key}")]
    Conflict { key: String },

    /// Transient failure reaching the store (connection, pool, IO)
    #[error("store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-transient backend failure (bad query, schema mismatch)
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn conflict(key: impl Into<String>) -> Self {
        StoreError::Conflict { key: key.into() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable(reason.into().into())
    }

    /// Conflicts and transient outages are retried inside the attempt loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Unavailable(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::StoreUnavailable(err)
    }
}

/// Result type alias for ledger and cascade operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
