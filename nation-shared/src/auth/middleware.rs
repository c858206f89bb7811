/// Authentication middleware for Axum
///
/// Extracts the bearer token from the `Authorization` header, verifies it
/// with the configured [`TokenVerifier`] and adds an [`AuthContext`] to the
/// request extensions.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use nation_shared::auth::middleware::{require_auth, AuthContext};
/// use nation_shared::auth::verifier::TokenVerifier;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/protected", get(handler))
///     .layer(middleware::from_fn_with_state(TokenVerifier::Anonymous, require_auth));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::verifier::TokenVerifier;

/// Authentication context added to request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: String,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Error type for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No usable bearer token
    #[error("Missing Authorization header")]
    MissingCredentials,

    /// Token verification failed
    #[error("Invalid or expired token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": "unauthorized",
            "message": self.to_string(),
        }));

        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            header::HeaderValue::from_static("Bearer"),
        );
        response
    }
}

/// Reads the token from `Authorization: Bearer <token>`
///
/// The scheme is matched case-insensitively. A header with another scheme
/// counts as missing.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::MissingCredentials)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredentials);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Bearer authentication middleware
///
/// Returns 401 when the header is missing or the token does not verify.
pub async fn require_auth(
    State(verifier): State<TokenVerifier>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;
    let user_id = verifier.verify(token).await?;

    req.extensions_mut().insert(AuthContext::new(user_id));

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn test_bearer_token_rejections() {
        assert!(bearer_token(&HeaderMap::new()).is_err());
        assert!(bearer_token(&headers("Basic abc")).is_err());
        assert!(bearer_token(&headers("Bearer ")).is_err());
        assert!(bearer_token(&headers("Bearer")).is_err());
    }

    #[test]
    fn test_auth_error_into_response() {
        let response = AuthError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = AuthError::MissingCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
