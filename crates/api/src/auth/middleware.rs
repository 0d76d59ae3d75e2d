//! Request authentication
//!
//! The session token is read from `Authorization: Bearer <jwt>` or, for
//! browser form posts, from the `sb-access-token` cookie.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use offertedesk_shared::{CurrentUser, UserId};

use super::jwt::{JwtError, JwtManager};
use crate::error::ApiError;

/// Cookie the auth provider's browser client stores the access token in
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// State needed by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtManager,
}

/// Authenticated caller, inserted as a request extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn current_user(&self) -> CurrentUser {
        CurrentUser::new(self.user_id, self.email.clone())
    }
}

/// Pull the raw token from the request headers
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn authenticate(auth: &AuthState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = extract_token(headers).ok_or(ApiError::Unauthorized)?;

    let claims = auth.jwt.validate_supabase_token(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        ApiError::InvalidToken
    })?;
    let user = claims.current_user().map_err(|e: JwtError| {
        tracing::warn!(error = %e, "Session token has no usable subject");
        ApiError::InvalidToken
    })?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
    })
}

/// Reject requests without a valid session
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&auth, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Attach the caller when a valid session is present, continue anonymously otherwise
pub async fn optional_auth(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(user) = authenticate(&auth, request.headers()) {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=abc.def.ghi; other=1"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_token(&headers).is_none());
    }
}
