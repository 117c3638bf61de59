use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::auth::ACCESS_TOKEN_HEADER;
use crate::model::OsmUser;
use crate::store::Store;

/// The caller of a write request.
///
/// The `access-token` header is resolved through the configured validator and
/// the user row is created or refreshed. A missing or unknown token is a 403,
/// and since this runs before the body is read, no payload is ever parsed for
/// an anonymous caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub OsmUser);

#[async_trait]
impl<S> FromRequestParts<AppState<S>> for AuthenticatedUser
where
    S: Store + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_header_value(&parts.headers, ACCESS_TOKEN_HEADER) else {
            log::warn!("Rejected {} {}: no access token", parts.method, parts.uri.path());
            return Err(ApiError::Unauthorized(
                "Authentication credentials were not provided.".to_string(),
            ));
        };

        let Some(identity) = state.validator.validate(&token).await? else {
            log::warn!("Rejected {} {}: invalid access token", parts.method, parts.uri.path());
            return Err(ApiError::Unauthorized("Invalid access token.".to_string()));
        };

        let user = state.store.upsert_user(&identity).await?;
        Ok(AuthenticatedUser(user))
    }
}

/// Extract a non-blank header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
