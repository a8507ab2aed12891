//! The identity boundary: who is making this request.
//!
//! Authentication is an external collaborator (a gateway or session layer);
//! by the time a request reaches this process, it carries the authenticated
//! user's id in a trusted header. The extractor only parses that header —
//! it performs no credential checks of its own.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::types::UserId;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated requester, extracted from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester(pub UserId);

/// Errors extracting the requester identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity header is absent.
    #[error("missing required header: {USER_ID_HEADER}")]
    Missing,

    /// The identity header is not a decimal user id.
    #[error("malformed {USER_ID_HEADER} header")]
    Malformed,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = IdentityError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(IdentityError::Missing)?;
        let id: u64 = value
            .to_str()
            .map_err(|_| IdentityError::Malformed)?
            .trim()
            .parse()
            .map_err(|_| IdentityError::Malformed)?;
        Ok(Requester(UserId(id)))
    }
}
