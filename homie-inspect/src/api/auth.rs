//! Owner identity extractor

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use homie_common::api::{parse_owner_id, OwnerAuthError, OwnerId, OWNER_HEADER};

use crate::error::ApiError;

/// Authenticated owner of the request
///
/// Rejects with 401 when the `x-owner-id` header is missing or unusable.
#[derive(Debug, Clone)]
pub struct Owner(pub OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = match parts.headers.get(OWNER_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| {
                ApiError::Unauthenticated(
                    OwnerAuthError::Invalid("not valid UTF-8".to_string()).to_string(),
                )
            })?),
            None => None,
        };

        parse_owner_id(raw)
            .map(Owner)
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Owner, ApiError> {
        let mut builder = Request::builder().uri("/homes");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Owner::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_owner_header_is_required() {
        let err = extract(None).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHENTICATED");

        let err = extract(Some("../etc")).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHENTICATED");

        let Owner(owner) = extract(Some(" owner-1 ")).await.unwrap();
        assert_eq!(owner.as_str(), "owner-1");
    }
}
