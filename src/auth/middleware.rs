//! Authentication extractors
//!
//! Resolve the bearer token on a request into the caller's [`UserId`].
//! Handlers take the identity explicitly and pass it down as a parameter.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::AppState;
use crate::data::UserId;
use crate::error::AppError;

fn extract_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Identity resolved for this request; cached in extensions
#[derive(Debug, Clone, Copy)]
struct ResolvedIdentity(Option<UserId>);

/// Resolve the caller once per request
///
/// No header means anonymous. A bearer token that fails verification is
/// rejected rather than downgraded to anonymous.
fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<UserId>, AppError> {
    if let Some(ResolvedIdentity(identity)) = parts.extensions.get::<ResolvedIdentity>() {
        return Ok(*identity);
    }

    let identity = match extract_token_from_headers(&parts.headers) {
        Some(token) => Some(state.tokens.verify(token)?),
        None => None,
    };

    parts.extensions.insert(ResolvedIdentity(identity));
    Ok(identity)
}

/// Extractor for an authenticated caller
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(viewer): CurrentUser) -> impl IntoResponse {
///     format!("Hello, user {viewer}")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        resolve(parts, &state)?
            .map(CurrentUser)
            .ok_or(AppError::Unauthenticated)
    }
}

/// Optional caller extractor
///
/// `None` when the request carries no bearer token.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<UserId>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(MaybeUser(resolve(parts, &state)?))
    }
}
