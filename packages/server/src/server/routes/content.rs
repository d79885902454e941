use axum::{
    extract::{Extension, Path},
    Json,
};
use engagement::{CascadeOutcome, ContentItem, DocumentStore};
use serde::Serialize;
use tracing::info;

use crate::policy::Operation;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::{require_user, AuthUser};

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub content_id: String,
    pub engagement_count: u64,
}

pub async fn get_content_handler<S: DocumentStore + 'static>(
    Extension(state): Extension<AppState<S>>,
    Path(content_id): Path<String>,
) -> Result<Json<ContentItem>, ApiError> {
    let item = state.ledger.repository().get(&content_id).await?;
    Ok(Json(item))
}

/// Delete a content item and every child record under it.
///
/// Allowed for the owner and for admins. A cascade that stops partway answers
/// 500 with the resume progress in the body.
pub async fn delete_content_handler<S: DocumentStore + 'static>(
    Extension(state): Extension<AppState<S>>,
    user: Option<Extension<AuthUser>>,
    Path(content_id): Path<String>,
) -> Result<Json<CascadeOutcome>, ApiError> {
    let user = require_user(user)?;
    state.authorize(Operation::Delete, &user, &content_id).await?;

    let outcome = state.planner.delete_content_and_children(&content_id).await?;
    info!(
        content_id = %content_id,
        user_id = %user.user_id,
        deleted = outcome.total_deleted,
        "Content deleted"
    );
    Ok(Json(outcome))
}

/// Rewrite the engagement counter from the stored records (admins only).
pub async fn reconcile_handler<S: DocumentStore + 'static>(
    Extension(state): Extension<AppState<S>>,
    user: Option<Extension<AuthUser>>,
    Path(content_id): Path<String>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let user = require_user(user)?;
    state.authorize(Operation::Reconcile, &user, &content_id).await?;

    let engagement_count = state.ledger.reconcile(&content_id).await?;
    Ok(Json(ReconcileResponse {
        content_id,
        engagement_count,
    }))
}
