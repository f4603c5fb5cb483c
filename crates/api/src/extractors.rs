//! Request extractors.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use pollen_db::entities::user;
use serde::Deserialize;

/// Default page size when the client does not send one.
const DEFAULT_LIMIT: u64 = 20;

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// Optional authenticated user extractor.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<user::Model>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<user::Model>().cloned()))
    }
}

/// Offset pagination query (`?skip=&limit=`).
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

/// Cursor pagination query (`?before=&limit=`), newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct Cursor {
    pub before: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub(crate) const fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

/// Split a comma-separated id list from a query string.
#[must_use]
pub fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ids() {
        assert_eq!(split_ids(Some("a, b,,c")), vec!["a", "b", "c"]);
        assert!(split_ids(None).is_empty());
        assert!(split_ids(Some("")).is_empty());
    }
}
