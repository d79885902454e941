use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use engagement::{DocumentStore, EngagementChange};
use serde::Serialize;

use crate::policy::Operation;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::{require_user, AuthUser};

#[derive(Debug, Serialize)]
pub struct EngagementStatus {
    pub content_id: String,
    pub engaged: bool,
}

/// Like / join on behalf of the caller. 201 with the new counter value.
pub async fn add_engagement_handler<S: DocumentStore + 'static>(
    Extension(state): Extension<AppState<S>>,
    user: Option<Extension<AuthUser>>,
    Path(content_id): Path<String>,
) -> Result<(StatusCode, Json<EngagementChange>), ApiError> {
    let user = require_user(user)?;
    state.authorize(Operation::Engage, &user, &content_id).await?;

    let change = state.ledger.add_engagement(&content_id, &user.user_id).await?;
    Ok((StatusCode::CREATED, Json(change)))
}

pub async fn remove_engagement_handler<S: DocumentStore + 'static>(
    Extension(state): Extension<AppState<S>>,
    user: Option<Extension<AuthUser>>,
    Path(content_id): Path<String>,
) -> Result<Json<EngagementChange>, ApiError> {
    let user = require_user(user)?;
    state.authorize(Operation::Disengage, &user, &content_id).await?;

    let change = state
        .ledger
        .remove_engagement(&content_id, &user.user_id)
        .await?;
    Ok(Json(change))
}

pub async fn engagement_status_handler<S: DocumentStore + 'static>(
    Extension(state): Extension<AppState<S>>,
    user: Option<Extension<AuthUser>>,
    Path(content_id): Path<String>,
) -> Result<Json<EngagementStatus>, ApiError> {
    let user = require_user(user)?;
    let engaged = state.ledger.has_engaged(&content_id, &user.user_id).await?;
    Ok(Json(EngagementStatus {
        content_id,
        engaged,
    }))
}
