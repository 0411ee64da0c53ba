use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Conversation, ConversationKind},
    services::profile_service::ProfileService,
};

pub struct DirectResolver;

impl DirectResolver {
    /// Canonical key for the unordered user pair of a direct conversation.
    pub fn direct_key(a: Uuid, b: Uuid) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{lo}:{hi}")
    }

    /// Find or create the direct conversation between two users.
    ///
    /// Concurrent creates race on the unique `direct_key` index; the loser
    /// re-reads the winner's row so both callers see the same conversation.
    pub async fn resolve(
        db: &Pool<Postgres>,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<Conversation, AppError> {
        if user_id == other_user_id {
            return Err(AppError::BadRequest(
                "Cannot create direct conversation with yourself".into(),
            ));
        }

        if ProfileService::fetch(db, other_user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }

        let key = Self::direct_key(user_id, other_user_id);

        if let Some(existing) = Self::find_by_key(db, &key).await? {
            return Ok(existing);
        }

        match Self::create(db, &key, user_id, other_user_id).await {
            Ok(conversation) => Ok(conversation),
            Err(AppError::Database(sqlx::Error::Database(e)))
                if e.code().as_deref() == Some("23505") =>
            {
                Self::find_by_key(db, &key).await?.ok_or(AppError::Internal)
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_key(db: &Pool<Postgres>, key: &str) -> Result<Option<Conversation>, AppError> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE direct_key = $1")
                .bind(key)
                .fetch_optional(db)
                .await?;

        Ok(conversation)
    }

    async fn create(
        db: &Pool<Postgres>,
        key: &str,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<Conversation, AppError> {
        let mut tx = db.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (id, kind, direct_key)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ConversationKind::Direct.as_str())
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (id, conversation_id, user_id, role)
            VALUES ($1, $2, $3, 'member'), ($4, $2, $5, 'member')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation.id)
        .bind(user_id)
        .bind(Uuid::new_v4())
        .bind(other_user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(conversation)
    }
}
