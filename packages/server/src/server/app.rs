//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Extension, middleware, routing::get, routing::post, Router};
use engagement::{CascadePlanner, DocumentStore, EngagementLedger};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::policy::{AccessPolicy, Operation, OwnerOrAdminPolicy};
use crate::server::error::ApiError;
use crate::server::middleware::{identity_middleware, AuthUser};
use crate::server::routes::{
    add_engagement_handler, delete_content_handler, engagement_status_handler,
    get_content_handler, health_handler, reconcile_handler, remove_engagement_handler,
};

/// Shared application state
pub struct AppState<S> {
    pub store: Arc<S>,
    pub ledger: Arc<EngagementLedger<S>>,
    pub planner: Arc<CascadePlanner<S>>,
    pub policy: Arc<dyn AccessPolicy>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
            planner: Arc::clone(&self.planner),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<S: DocumentStore + 'static> AppState<S> {
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        Self {
            ledger: Arc::new(EngagementLedger::new(Arc::clone(&store), config.ledger.clone())),
            planner: Arc::new(CascadePlanner::new(Arc::clone(&store), config.cascade.clone())),
            policy: Arc::new(OwnerOrAdminPolicy::new(config.admin_user_ids.clone())),
            store,
        }
    }

    pub fn with_policy(mut self, policy: impl AccessPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Check `operation` against the policy using the item's current owner.
    pub async fn authorize(
        &self,
        operation: Operation,
        user: &AuthUser,
        content_id: &str,
    ) -> Result<(), ApiError> {
        let item = self.ledger.repository().get(content_id).await?;
        if self
            .policy
            .allows(operation, &user.user_id, item.owner_id.as_deref())
        {
            Ok(())
        } else {
            tracing::debug!(%operation, user_id = %user.user_id, content_id, "Access denied");
            Err(ApiError::Forbidden {
                operation,
                user_id: user.user_id.clone(),
                content_id: content_id.to_string(),
            })
        }
    }
}

/// Build the Axum application router
pub fn build_app<S: DocumentStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<S>))
        .route(
            "/content/:id",
            get(get_content_handler::<S>).delete(delete_content_handler::<S>),
        )
        .route("/content/:id/reconcile", post(reconcile_handler::<S>))
        .route(
            "/content/:id/engagements/me",
            get(engagement_status_handler::<S>)
                .put(add_engagement_handler::<S>)
                .delete(remove_engagement_handler::<S>),
        )
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(identity_middleware))
        .layer(Extension(state))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}
