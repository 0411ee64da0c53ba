use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Conversation, ConversationKind, ConversationSummary, MessageDto, Participant},
    services::profile_service::ProfileService,
    websocket::{Fanout, PushEvent},
};

pub struct ConversationService;

impl ConversationService {
    /// Load the caller's participant row, rejecting non-members.
    pub async fn assert_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Participant, AppError> {
        sqlx::query_as::<_, Participant>(
            "SELECT * FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::Forbidden("Not a participant".into()))
    }

    /// Cheap membership probe for the realtime relay path.
    pub async fn is_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let row = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        Ok(row.is_some())
    }

    pub async fn other_participants(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM conversation_participants WHERE conversation_id = $1 AND user_id <> $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_all(db)
        .await?;

        Ok(ids)
    }

    /// Create a group conversation. The creator is always included and
    /// becomes the only admin.
    pub async fn create_group(
        db: &Pool<Postgres>,
        creator_id: Uuid,
        title: Option<&str>,
        participant_user_ids: &[Uuid],
    ) -> Result<Conversation, AppError> {
        let mut ids: Vec<Uuid> = vec![creator_id];
        for id in participant_user_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.len() < 3 {
            return Err(AppError::BadRequest(
                "Group requires at least 3 unique participants".into(),
            ));
        }

        let existing = ProfileService::count_existing(db, &ids).await?;
        if existing != ids.len() as i64 {
            return Err(AppError::BadRequest(
                "One or more participants not found".into(),
            ));
        }

        let title = title.map(str::trim).filter(|t| !t.is_empty());

        let mut tx = db.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (id, kind, title)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ConversationKind::Group.as_str())
        .bind(title)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in &ids {
            let role = if *user_id == creator_id {
                "admin"
            } else {
                "member"
            };
            sqlx::query(
                r#"
                INSERT INTO conversation_participants (id, conversation_id, user_id, role)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(conversation.id)
            .bind(user_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(conversation)
    }

    /// The caller's inbox: one summary per conversation, pinned entries
    /// first, then most recent activity.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.kind, c.title, c.avatar_url, c.last_message_at,
                   p.is_pinned, p.pinned_at, p.muted_until, p.last_read_at
            FROM conversation_participants p
            JOIN conversations c ON c.id = p.conversation_id
            WHERE p.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let conversation_ids: Vec<Uuid> = rows.iter().map(|r| r.get("id")).collect();

        // Counterpart user per conversation; only consulted for direct ones.
        let other_rows = sqlx::query(
            r#"
            SELECT conversation_id, user_id
            FROM conversation_participants
            WHERE conversation_id = ANY($1) AND user_id <> $2
            "#,
        )
        .bind(&conversation_ids)
        .bind(user_id)
        .fetch_all(db)
        .await?;
        let mut other_by_convo: HashMap<Uuid, Uuid> = HashMap::new();
        for row in &other_rows {
            other_by_convo
                .entry(row.get("conversation_id"))
                .or_insert_with(|| row.get("user_id"));
        }

        // Unread = messages from others after the read watermark. Tombstones
        // still count; clients show them as placeholders.
        let unread_rows = sqlx::query(
            r#"
            SELECT m.conversation_id, COUNT(*) AS unread
            FROM messages m
            JOIN conversation_participants p
              ON p.conversation_id = m.conversation_id AND p.user_id = $1
            WHERE m.conversation_id = ANY($2)
              AND m.sender_id <> $1
              AND m.created_at > COALESCE(p.last_read_at, 'epoch'::timestamptz)
            GROUP BY m.conversation_id
            "#,
        )
        .bind(user_id)
        .bind(&conversation_ids)
        .fetch_all(db)
        .await?;
        let unread_by_convo: HashMap<Uuid, i64> = unread_rows
            .iter()
            .map(|r| (r.get("conversation_id"), r.get("unread")))
            .collect();

        let last_rows = sqlx::query_as::<_, crate::models::Message>(
            r#"
            SELECT DISTINCT ON (conversation_id) *
            FROM messages
            WHERE conversation_id = ANY($1)
            ORDER BY conversation_id, created_at DESC
            "#,
        )
        .bind(&conversation_ids)
        .fetch_all(db)
        .await?;
        let mut last_by_convo: HashMap<Uuid, crate::models::Message> = HashMap::new();
        for m in last_rows {
            last_by_convo.insert(m.conversation_id, m);
        }

        let mut profile_ids: Vec<Uuid> = Vec::new();
        for row in &rows {
            let kind: String = row.get("kind");
            if kind == ConversationKind::Direct.as_str() {
                let conversation_id: Uuid = row.get("id");
                if let Some(other) = other_by_convo.get(&conversation_id) {
                    if !profile_ids.contains(other) {
                        profile_ids.push(*other);
                    }
                }
            }
        }
        for m in last_by_convo.values() {
            if !profile_ids.contains(&m.sender_id) {
                profile_ids.push(m.sender_id);
            }
        }
        let profiles = ProfileService::fetch_map(db, &profile_ids).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_id: Uuid = row.get("id");
            let kind: String = row.get("kind");

            let mut display_name: Option<String> = row.get("title");
            let mut username: Option<String> = None;
            let mut avatar_url: Option<String> = row.get("avatar_url");
            let mut other_user_id: Option<Uuid> = None;

            if kind == ConversationKind::Direct.as_str() {
                let other = other_by_convo.get(&conversation_id).copied();
                other_user_id = other;
                let profile = other.and_then(|id| profiles.get(&id));
                display_name = Some(
                    profile
                        .and_then(|p| p.display_identity())
                        .unwrap_or_else(|| "User".to_string()),
                );
                username = profile.and_then(|p| p.username.clone());
                avatar_url = profile.and_then(|p| p.avatar_url.clone()).or(avatar_url);
            }

            let last_message = last_by_convo.get(&conversation_id).map(|m| {
                let sender_name = profiles
                    .get(&m.sender_id)
                    .and_then(|p| p.display_identity());
                MessageDto::from_message(m.clone(), sender_name)
            });

            items.push(ConversationSummary {
                id: conversation_id,
                kind,
                display_name,
                username,
                avatar_url,
                other_user_id,
                is_pinned: row.get("is_pinned"),
                pinned_at: row.get("pinned_at"),
                muted_until: row.get("muted_until"),
                last_message_at: row.get("last_message_at"),
                unread_count: unread_by_convo
                    .get(&conversation_id)
                    .copied()
                    .unwrap_or(0),
                last_message,
            });
        }

        items.sort_by(compare_inbox_entries);

        Ok(items)
    }

    /// Advance the caller's read watermark and tell the other participants.
    ///
    /// With an explicit message id the watermark lands on that message's
    /// timestamp, so the watermark can move backwards. Without one it lands
    /// on now.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        fanout: &dyn Fanout,
        conversation_id: Uuid,
        user_id: Uuid,
        last_read_message_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        let participant = Self::assert_participant(db, conversation_id, user_id).await?;

        let mut last_read_at = Utc::now();
        if let Some(message_id) = last_read_message_id {
            let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
                "SELECT created_at FROM messages WHERE id = $1 AND conversation_id = $2",
            )
            .bind(message_id)
            .bind(conversation_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::BadRequest("last_read_message_id not found".into()))?;
            last_read_at = created_at;
        }

        sqlx::query(
            r#"
            UPDATE conversation_participants
            SET last_read_message_id = $2, last_read_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(participant.id)
        .bind(last_read_message_id.or(participant.last_read_message_id))
        .bind(last_read_at)
        .execute(db)
        .await?;

        for recipient in Self::other_participants(db, conversation_id, user_id).await? {
            fanout
                .emit_to_user(
                    recipient,
                    PushEvent::MessageRead {
                        conversation_id,
                        reader_id: user_id,
                        last_read_message_id,
                    },
                )
                .await;
        }

        Ok(())
    }

    pub async fn set_pinned(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
        pinned: bool,
    ) -> Result<(), AppError> {
        let participant = Self::assert_participant(db, conversation_id, user_id).await?;

        let pinned_at: Option<DateTime<Utc>> = if pinned { Some(Utc::now()) } else { None };
        sqlx::query(
            r#"
            UPDATE conversation_participants
            SET is_pinned = $2, pinned_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(participant.id)
        .bind(pinned)
        .bind(pinned_at)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Mute for the given number of seconds; zero or absent clears the mute.
    pub async fn mute(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
        mute_for_seconds: Option<i64>,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let participant = Self::assert_participant(db, conversation_id, user_id).await?;

        let seconds = mute_for_seconds.unwrap_or(0).max(0);
        let muted_until = if seconds == 0 {
            None
        } else {
            Some(Utc::now() + Duration::seconds(seconds))
        };

        sqlx::query(
            "UPDATE conversation_participants SET muted_until = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(participant.id)
        .bind(muted_until)
        .execute(db)
        .await?;

        Ok(muted_until)
    }
}

/// Inbox order: pinned before unpinned, pinned ties by pin time (newest
/// first), everything else by last activity (newest first). Missing
/// timestamps sort as the epoch.
fn compare_inbox_entries(a: &ConversationSummary, b: &ConversationSummary) -> Ordering {
    if a.is_pinned != b.is_pinned {
        return if a.is_pinned {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    if a.is_pinned && b.is_pinned {
        let ap = a.pinned_at.map(|t| t.timestamp_millis()).unwrap_or(0);
        let bp = b.pinned_at.map(|t| t.timestamp_millis()).unwrap_or(0);
        if ap != bp {
            return bp.cmp(&ap);
        }
    }

    let at = a.last_message_at.map(|t| t.timestamp_millis()).unwrap_or(0);
    let bt = b.last_message_at.map(|t| t.timestamp_millis()).unwrap_or(0);
    bt.cmp(&at)
}
