use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppError;

pub struct SocialGraphService;

impl SocialGraphService {
    /// Whether `follower_id` follows `followee_id`.
    pub async fn follows(
        db: &Pool<Postgres>,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<bool, AppError> {
        let row = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2 LIMIT 1",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(db)
        .await?;

        Ok(row.is_some())
    }
}
