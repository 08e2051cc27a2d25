//! Request authentication middleware.
//!
//! `require_identity` authenticates the bearer token and attaches an
//! [`AuthContext`] to the request extensions; `require_admin` must be layered
//! inside it.
use crate::api::error::{ApiError, api_forbidden, api_unauthorized};
use crate::app::AppState;
use crate::auth::authenticator::extract_bearer;
use crate::cluster::CallerContext;
use axum::extract::{Query, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use dashboard_authz::{Identity, LegacyClaims};
use serde::Deserialize;

/// Authenticated caller attached by [`require_identity`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    pub legacy_claims: Option<LegacyClaims>,
}

impl AuthContext {
    pub fn caller(&self, headers: &HeaderMap) -> CallerContext {
        CallerContext::new(
            Some(self.identity.clone()),
            self.legacy_claims.clone(),
            headers,
        )
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer header first; WebSocket clients may only be able to pass `?token=`.
pub fn request_token(request: &Request) -> Option<String> {
    if let Some(bearer) = extract_bearer(request.headers()) {
        return Some(bearer.to_string());
    }
    Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.token)
}

pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request_token(&request);
    let (identity, legacy_claims) = state
        .authenticator
        .authenticate(token.as_deref())
        .await
        .into_parts()?;
    tracing::debug!(
        user = %identity.username,
        source = %identity.source,
        role = %identity.role,
        "request authenticated"
    );
    request.extensions_mut().insert(AuthContext {
        identity,
        legacy_claims,
    });
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let Some(auth) = request.extensions().get::<AuthContext>() else {
        return Err(api_unauthorized("missing token"));
    };
    if !auth.identity.is_admin() {
        return Err(api_forbidden(format!(
            "user {} is not an administrator",
            auth.identity.username
        )));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn header_token_wins_over_query() {
        let request = Request::builder()
            .uri("/api/v1/terminal?token=from-query")
            .header("authorization", "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_token(&request).as_deref(), Some("from-header"));
    }

    #[test]
    fn query_token_is_used_for_websockets() {
        let request = Request::builder()
            .uri("/api/v1/terminal?pod=web&token=from-query")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_token(&request).as_deref(), Some("from-query"));

        let request = Request::builder()
            .uri("/api/v1/terminal")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_token(&request), None);
    }
}
