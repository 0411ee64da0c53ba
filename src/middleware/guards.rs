use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated caller, recovered from the id the auth middleware
/// stashed in request extensions.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Uuid>()
            .copied()
            .map(AuthedUser)
            .ok_or(AppError::Unauthorized)
    }
}
