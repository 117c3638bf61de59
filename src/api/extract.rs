use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;
use crate::model::Id;

/// Request body as JSON, or as an urlencoded form when the client says so.
/// Any rejection becomes a 400 `ApiError`.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| Payload(value))
                .map_err(|rejection| ApiError::malformed(rejection.body_text()))
        } else {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| Payload(value))
                .map_err(|rejection| ApiError::malformed(rejection.body_text()))
        }
    }
}

/// Query-string filters; a bad value is a 400 `ApiError`.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| ApiError::malformed(rejection.body_text()))
    }
}

/// The `:id` path segment. Anything that is not an id cannot name a record, so
/// it is a 404 rather than a 400.
#[derive(Debug, Clone, Copy)]
pub struct RecordId(pub Id);

#[async_trait]
impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::NotFound(rejection.body_text()))?;
        raw.parse::<Id>()
            .map(RecordId)
            .map_err(|_| ApiError::NotFound(format!("No record with id '{}'.", raw)))
    }
}
