use std::collections::HashMap;

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{error::AppError, models::UserProfile};

pub struct ProfileService;

impl ProfileService {
    pub async fn fetch(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> Result<Option<UserProfile>, AppError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, display_name, email, avatar_url FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        Ok(profile)
    }

    /// Profiles for a set of users, keyed by id. Unknown ids are simply
    /// absent from the map.
    pub async fn fetch_map(
        db: &Pool<Postgres>,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, UserProfile>, AppError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, display_name, email, avatar_url FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(db)
        .await?;

        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    pub async fn count_existing(db: &Pool<Postgres>, user_ids: &[Uuid]) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ANY($1)")
            .bind(user_ids)
            .fetch_one(db)
            .await?;

        Ok(count)
    }
}
