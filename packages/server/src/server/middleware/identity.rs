use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
    Extension,
};
use tracing::debug;

use crate::server::error::ApiError;

/// Header carrying the caller id, set by the upstream identity verifier.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity resolved for the current request
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
}

/// Identity middleware
///
/// Reads the verified caller id from `X-User-Id` and adds `AuthUser` to request extensions.
/// Requests without it continue anonymously; handlers that need a caller reject them.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    match extract_auth_user(&request) {
        Some(user) => {
            debug!(user_id = %user.user_id, "Resolved caller identity");
            request.extensions_mut().insert(user);
        }
        None => debug!("No caller identity on request"),
    }

    next.run(request).await
}

fn extract_auth_user(request: &Request) -> Option<AuthUser> {
    let value = request.headers().get(USER_ID_HEADER)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(AuthUser {
        user_id: value.to_string(),
    })
}

/// Unwrap the caller identity or fail with 401.
pub fn require_user(user: Option<Extension<AuthUser>>) -> Result<AuthUser, ApiError> {
    user.map(|Extension(user)| user).ok_or(ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder();
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_user_id() {
        let user = extract_auth_user(&request_with(Some(" alice "))).unwrap();
        assert_eq!(user.user_id, "alice");
    }

    #[test]
    fn test_missing_or_blank_header() {
        assert!(extract_auth_user(&request_with(None)).is_none());
        assert!(extract_auth_user(&request_with(Some("  "))).is_none());
    }

    #[test]
    fn test_require_user() {
        assert!(matches!(require_user(None), Err(ApiError::Unauthorized)));
        let user = require_user(Some(Extension(AuthUser {
            user_id: "bob".into(),
        })))
        .unwrap();
        assert_eq!(user.user_id, "bob");
    }
}
