use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        Conversation, ConversationKind, Message, MessageDto, MessageKind, MessagePayload,
        NotificationKind,
    },
    services::{
        conversation_service::ConversationService,
        notification_service::{NewNotification, NotificationService},
        profile_service::ProfileService,
        social_graph::SocialGraphService,
    },
    websocket::{Fanout, PushEvent},
};

/// Body of POST /conversations/:id/messages.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub kind: String,
    pub text: Option<String>,
    pub gif_url: Option<String>,
    pub media_url: Option<String>,
    pub sticker_url: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
}

/// Page size for history listing: default 50, never below 1 or above 200.
fn page_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(50).clamp(1, 200)
}

pub struct MessageService;

impl MessageService {
    /// A page of history, newest first. `before_id` pages backwards from a
    /// known message; an id that does not resolve in this conversation is
    /// ignored and the newest page is returned.
    pub async fn list(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
        limit: Option<i64>,
        before_id: Option<Uuid>,
    ) -> Result<Vec<MessageDto>, AppError> {
        ConversationService::assert_participant(db, conversation_id, user_id).await?;

        let limit = page_limit(limit);

        let mut before_created_at: Option<DateTime<Utc>> = None;
        if let Some(before_id) = before_id {
            before_created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
                "SELECT created_at FROM messages WHERE id = $1 AND conversation_id = $2",
            )
            .bind(before_id)
            .bind(conversation_id)
            .fetch_optional(db)
            .await?;
        }

        let rows = match before_created_at {
            Some(cursor) => {
                sqlx::query_as::<_, Message>(
                    r#"
                    SELECT * FROM messages
                    WHERE conversation_id = $1 AND created_at < $2
                    ORDER BY created_at DESC
                    LIMIT $3
                    "#,
                )
                .bind(conversation_id)
                .bind(cursor)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Message>(
                    r#"
                    SELECT * FROM messages
                    WHERE conversation_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2
                    "#,
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
        };

        let mut sender_ids: Vec<Uuid> = Vec::new();
        for m in &rows {
            if !sender_ids.contains(&m.sender_id) {
                sender_ids.push(m.sender_id);
            }
        }
        let profiles = ProfileService::fetch_map(db, &sender_ids).await?;

        Ok(rows
            .into_iter()
            .map(|m| {
                let sender_name = profiles
                    .get(&m.sender_id)
                    .and_then(|p| p.display_identity());
                MessageDto::from_message(m, sender_name)
            })
            .collect())
    }

    /// Accept a message, bump conversation recency, and push it to every
    /// other participant. The first message into a direct conversation also
    /// files a message request when the receiver does not follow the sender.
    pub async fn send(
        db: &Pool<Postgres>,
        fanout: &dyn Fanout,
        conversation_id: Uuid,
        sender_id: Uuid,
        request: SendMessageRequest,
    ) -> Result<MessageDto, AppError> {
        ConversationService::assert_participant(db, conversation_id, sender_id).await?;

        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(db)
                .await?
                .ok_or_else(|| AppError::NotFound("Conversation not found".into()))?;

        let had_messages = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE conversation_id = $1)",
        )
        .bind(conversation_id)
        .fetch_one(db)
        .await?;

        let kind = MessageKind::parse(&request.kind).ok_or_else(|| {
            AppError::BadRequest("kind must be one of text, gif, media, sticker".into())
        })?;
        let payload = MessagePayload::from_parts(
            kind,
            request.text.as_deref(),
            request.gif_url.as_deref(),
            request.media_url.as_deref(),
            request.sticker_url.as_deref(),
        )?;

        if let Some(reply_id) = request.reply_to_message_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = $1 AND conversation_id = $2)",
            )
            .bind(reply_id)
            .bind(conversation_id)
            .fetch_one(db)
            .await?;
            if !exists {
                return Err(AppError::BadRequest(
                    "reply_to_message_id not found".into(),
                ));
            }
        }

        let (text, gif_url, media_url, sticker_url) = payload.into_columns();
        let created = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (id, conversation_id, sender_id, kind, text, gif_url, media_url, sticker_url, reply_to_message_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(kind.as_str())
        .bind(text)
        .bind(gif_url)
        .bind(media_url)
        .bind(sticker_url)
        .bind(request.reply_to_message_id)
        .fetch_one(db)
        .await?;

        // First contact into a direct conversation from someone the receiver
        // does not follow lands as a message request notification.
        if !had_messages && conversation.kind == ConversationKind::Direct.as_str() {
            let other = ConversationService::other_participants(db, conversation_id, sender_id)
                .await?
                .into_iter()
                .next();
            if let Some(other) = other {
                let receiver_follows_sender =
                    SocialGraphService::follows(db, other, sender_id).await?;
                if !receiver_follows_sender {
                    NotificationService::record(
                        db,
                        fanout,
                        NewNotification {
                            user_id: other,
                            kind: NotificationKind::MessageRequest,
                            actor_id: Some(sender_id),
                            entity_type: Some("conversation".to_string()),
                            entity_id: Some(conversation_id),
                            data: None,
                        },
                    )
                    .await?;
                }
            }
        }

        sqlx::query("UPDATE conversations SET last_message_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .bind(created.created_at)
            .execute(db)
            .await?;

        let sender_name = ProfileService::fetch(db, sender_id)
            .await?
            .and_then(|p| p.display_identity());
        let dto = MessageDto::from_message(created, sender_name);

        for recipient in
            ConversationService::other_participants(db, conversation_id, sender_id).await?
        {
            fanout
                .emit_to_user(
                    recipient,
                    PushEvent::MessageNew {
                        message: dto.clone(),
                    },
                )
                .await;
        }

        Ok(dto)
    }

    /// Tombstone a message. Only the sender may do this; the row keeps its
    /// place in history and readers get a payload-less shell.
    pub async fn delete(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        ConversationService::assert_participant(db, conversation_id, user_id).await?;

        let sender_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT sender_id FROM messages WHERE id = $1 AND conversation_id = $2",
        )
        .bind(message_id)
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?;

        if sender_id != user_id {
            return Err(AppError::Forbidden(
                "Only the sender can delete a message".into(),
            ));
        }

        sqlx::query("UPDATE messages SET is_deleted = TRUE WHERE id = $1")
            .bind(message_id)
            .execute(db)
            .await?;

        Ok(())
    }
}
