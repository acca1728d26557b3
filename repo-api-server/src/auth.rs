use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiError;
use crate::routes::AppState;

/// Reject requests whose `Authorization: Bearer` token does not equal the
/// configured key. A server without a key accepts everything.
pub async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.auth_key() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if provided.is_some_and(|token| tokens_match(token.as_bytes(), expected.as_bytes())) {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "rejected unauthenticated request");
        ApiError::Unauthorized.into_response()
    }
}

/// Equality whose running time depends only on the length of `expected`.
fn tokens_match(provided: &[u8], expected: &[u8]) -> bool {
    let mut diff = provided.len() ^ expected.len();
    for (i, &byte) in expected.iter().enumerate() {
        let other = provided.get(i).copied().unwrap_or(!byte);
        diff |= usize::from(other ^ byte);
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_match_exact_bytes_only() {
        assert!(tokens_match(b"s3cret-key", b"s3cret-key"));
        assert!(!tokens_match(b"s3cret-kex", b"s3cret-key"));
        assert!(!tokens_match(b"S3cret-key", b"s3cret-key"));
        assert!(!tokens_match(b"s3cret", b"s3cret-key"));
        assert!(!tokens_match(b"s3cret-key-and-more", b"s3cret-key"));
        assert!(!tokens_match(b"", b"s3cret-key"));
        assert!(tokens_match(b"", b""));
    }
}
