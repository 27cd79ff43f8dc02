use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// Set by the upstream auth layer once the bearer token is verified.
pub const AUTHOR_ID_HEADER: &str = "x-author-id";

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedAuthor(pub Uuid);

impl<S> FromRequestParts<S> for AuthenticatedAuthor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHOR_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Self)
            .ok_or_else(ApiError::unauthorized)
    }
}
