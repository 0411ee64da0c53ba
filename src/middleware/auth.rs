use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject - the user id
    pub exp: i64,    // expiration time (unix timestamp)
}

/// Validate an HS256 token signature and extract its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Resolve a bearer token to a user id. The subject claim must be a UUID.
pub fn authenticate(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let claims = verify_token(token, secret)?;
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)
}

/// Middleware to extract the bearer token and add user_id to request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let user_id = authenticate(token, &state.config.jwt_secret)?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn issue(sub: &str, exp: i64, secret: &str) -> String {
        encode(
            &Header::default(),
            &Claims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_token_and_returns_subject() {
        let user_id = Uuid::new_v4();
        let token = issue(
            &user_id.to_string(),
            chrono::Utc::now().timestamp() + 600,
            "secret",
        );

        assert_eq!(authenticate(&token, "secret").unwrap(), user_id);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = issue(
            &Uuid::new_v4().to_string(),
            chrono::Utc::now().timestamp() + 600,
            "secret",
        );

        assert!(matches!(
            authenticate(&token, "other"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let token = issue(
            &Uuid::new_v4().to_string(),
            chrono::Utc::now().timestamp() - 3600,
            "secret",
        );

        assert!(matches!(
            authenticate(&token, "secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let token = issue("not-a-uuid", chrono::Utc::now().timestamp() + 600, "secret");

        assert!(matches!(
            authenticate(&token, "secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(authenticate("garbage", "secret").is_err());
    }
}
