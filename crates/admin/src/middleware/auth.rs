//! Static bearer-token authentication for the admin API.
//!
//! Full admin user management is out of scope for this service; every
//! route instead requires the deploy-time `ADMIN_API_TOKEN`. Tokens are
//! compared through their SHA-256 digests so the comparison never
//! early-exits on a raw token byte.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::config::expose_token;
use crate::error::AppError;
use crate::state::AppState;

/// Reject any request that does not carry the configured bearer token.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer);

    match provided {
        Some(token) if token_matches(expose_token(&state.config().api_token), token) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("rejected admin request without valid token");
            AppError::Unauthorized.into_response()
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn parse_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Compare tokens via fixed-length digests.
fn token_matches(expected: &str, provided: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(provided.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("Bearer   spaced  "), Some("spaced"));
        assert_eq!(parse_bearer("Basic abc123"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("abc123"), None);
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("tok-1", "tok-1"));
        assert!(!token_matches("tok-1", "tok-2"));
        assert!(!token_matches("tok-1", ""));
    }
}
