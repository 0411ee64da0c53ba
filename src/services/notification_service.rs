use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        ActorProfile, Notification, NotificationKind, NotificationSummary, SummaryGroup,
        UserProfile,
    },
    services::profile_service::ProfileService,
    websocket::{Fanout, PushEvent},
};

/// How many recent rows the summary aggregates over.
const SUMMARY_WINDOW: i64 = 80;
/// How many unseen rows per kind are scanned for preview actors.
const ACTOR_SCAN: usize = 30;
/// Preview actors shown per group.
const ACTOR_LIMIT: usize = 3;

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub actor_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub data: Option<Value>,
}

pub struct NotificationService;

impl NotificationService {
    /// Persist a notification and nudge the recipient's live sessions. The
    /// push carries no content; clients re-fetch the summary.
    pub async fn record(
        db: &Pool<Postgres>,
        fanout: &dyn Fanout,
        new: NewNotification,
    ) -> Result<(), AppError> {
        // A notification without a recipient has nowhere to land.
        if new.user_id.is_nil() {
            return Ok(());
        }

        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO notifications (id, user_id, actor_id, kind, entity_type, entity_id, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.actor_id)
        .bind(new.kind.as_str())
        .bind(new.entity_type.as_deref())
        .bind(new.entity_id)
        .bind(new.data)
        .fetch_one(db)
        .await?;

        fanout
            .emit_to_user(
                new.user_id,
                PushEvent::NotificationsDirty {
                    kind: new.kind,
                    created_at,
                },
            )
            .await;

        Ok(())
    }

    pub async fn summary(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> Result<NotificationSummary, AppError> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(SUMMARY_WINDOW)
        .fetch_all(db)
        .await?;

        let mut actor_ids: Vec<Uuid> = Vec::new();
        for row in &rows {
            if let Some(actor_id) = row.actor_id {
                if !actor_ids.contains(&actor_id) {
                    actor_ids.push(actor_id);
                }
            }
        }
        let actors = ProfileService::fetch_map(db, &actor_ids).await?;

        Ok(Self::summarize(&rows, &actors))
    }

    /// Fold a window of rows (newest first) into per-kind groups. A kind
    /// present in the window always gets a group, even with nothing unseen,
    /// so clients can render "caught up" state per kind.
    pub fn summarize(
        rows: &[Notification],
        actors: &HashMap<Uuid, UserProfile>,
    ) -> NotificationSummary {
        let unread_total = rows.iter().filter(|r| r.seen_at.is_none()).count();

        let mut groups = Vec::new();
        for kind in NotificationKind::ALL {
            let of_kind: Vec<&Notification> =
                rows.iter().filter(|r| r.kind == kind.as_str()).collect();
            let Some(latest) = of_kind.first().copied() else {
                continue;
            };

            let unseen: Vec<&Notification> = of_kind
                .iter()
                .copied()
                .filter(|r| r.seen_at.is_none())
                .collect();

            let mut latest_actors = Vec::new();
            let mut picked: HashSet<Uuid> = HashSet::new();
            for row in unseen.iter().take(ACTOR_SCAN) {
                let Some(actor_id) = row.actor_id else {
                    continue;
                };
                if !picked.insert(actor_id) {
                    continue;
                }
                if let Some(profile) = actors.get(&actor_id) {
                    latest_actors.push(ActorProfile {
                        id: profile.id,
                        display_name: profile.display_identity(),
                        avatar_url: profile.avatar_url.clone(),
                    });
                }
                if latest_actors.len() >= ACTOR_LIMIT {
                    break;
                }
            }

            groups.push(SummaryGroup {
                kind,
                unread_count: unseen.len(),
                latest_at: latest.created_at,
                latest_actors,
                latest_entity_type: latest.entity_type.clone(),
                latest_entity_id: latest.entity_id,
                latest_data: latest.data.clone(),
            });
        }

        NotificationSummary {
            unread_total,
            groups,
        }
    }

    /// Stamp every unseen row (optionally of one kind) as seen now.
    pub async fn mark_seen(
        db: &Pool<Postgres>,
        user_id: Uuid,
        kind: Option<NotificationKind>,
    ) -> Result<(), AppError> {
        match kind {
            Some(kind) => {
                sqlx::query(
                    "UPDATE notifications SET seen_at = NOW() WHERE user_id = $1 AND kind = $2 AND seen_at IS NULL",
                )
                .bind(user_id)
                .bind(kind.as_str())
                .execute(db)
                .await?;
            }
            None => {
                sqlx::query(
                    "UPDATE notifications SET seen_at = NOW() WHERE user_id = $1 AND seen_at IS NULL",
                )
                .bind(user_id)
                .execute(db)
                .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn row(
        kind: NotificationKind,
        actor_id: Option<Uuid>,
        created_at: DateTime<Utc>,
        seen: bool,
    ) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            actor_id,
            kind: kind.as_str().to_string(),
            entity_type: None,
            entity_id: None,
            data: None,
            seen_at: seen.then_some(created_at),
            created_at,
        }
    }

    fn profile(id: Uuid, name: &str) -> UserProfile {
        UserProfile {
            id,
            username: None,
            display_name: Some(name.to_string()),
            email: None,
            avatar_url: None,
        }
    }

    #[test]
    fn empty_window_yields_no_groups() {
        let summary = NotificationService::summarize(&[], &HashMap::new());
        assert_eq!(summary.unread_total, 0);
        assert!(summary.groups.is_empty());
    }

    #[test]
    fn groups_follow_the_fixed_kind_order() {
        let rows = vec![
            row(NotificationKind::MessageRequest, None, at(300), false),
            row(NotificationKind::Mention, None, at(200), false),
            row(NotificationKind::Follow, None, at(100), false),
        ];

        let summary = NotificationService::summarize(&rows, &HashMap::new());
        let kinds: Vec<NotificationKind> = summary.groups.iter().map(|g| g.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Mention,
                NotificationKind::Follow,
                NotificationKind::MessageRequest,
            ]
        );
    }

    #[test]
    fn fully_seen_kind_still_gets_a_group_with_zero_unread() {
        let rows = vec![
            row(NotificationKind::Follow, None, at(200), true),
            row(NotificationKind::Follow, None, at(100), true),
        ];

        let summary = NotificationService::summarize(&rows, &HashMap::new());
        assert_eq!(summary.unread_total, 0);
        assert_eq!(summary.groups.len(), 1);
        assert_eq!(summary.groups[0].unread_count, 0);
        assert_eq!(summary.groups[0].latest_at, at(200));
        assert!(summary.groups[0].latest_actors.is_empty());
    }

    #[test]
    fn unread_counts_are_per_kind_and_total_spans_kinds() {
        let rows = vec![
            row(NotificationKind::Mention, None, at(500), false),
            row(NotificationKind::Mention, None, at(400), true),
            row(NotificationKind::Repost, None, at(300), false),
            row(NotificationKind::Repost, None, at(200), false),
        ];

        let summary = NotificationService::summarize(&rows, &HashMap::new());
        assert_eq!(summary.unread_total, 3);

        let mention = &summary.groups[0];
        assert_eq!(mention.kind, NotificationKind::Mention);
        assert_eq!(mention.unread_count, 1);

        let repost = &summary.groups[1];
        assert_eq!(repost.kind, NotificationKind::Repost);
        assert_eq!(repost.unread_count, 2);
    }

    #[test]
    fn preview_actors_are_deduped_and_capped_at_three() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();

        let mut actors = HashMap::new();
        actors.insert(a, profile(a, "Ada"));
        actors.insert(b, profile(b, "Brook"));
        actors.insert(c, profile(c, "Cato"));
        actors.insert(d, profile(d, "Dale"));

        let rows = vec![
            row(NotificationKind::Follow, Some(a), at(600), false),
            row(NotificationKind::Follow, Some(a), at(500), false),
            row(NotificationKind::Follow, Some(b), at(400), false),
            row(NotificationKind::Follow, Some(c), at(300), false),
            row(NotificationKind::Follow, Some(d), at(200), false),
        ];

        let summary = NotificationService::summarize(&rows, &actors);
        let group = &summary.groups[0];
        assert_eq!(group.unread_count, 5);

        let names: Vec<&str> = group
            .latest_actors
            .iter()
            .map(|p| p.display_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Ada", "Brook", "Cato"]);
    }

    #[test]
    fn rows_without_actor_or_profile_are_skipped_in_previews() {
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();

        let mut actors = HashMap::new();
        actors.insert(known, profile(known, "Known"));

        let rows = vec![
            row(NotificationKind::Mention, None, at(400), false),
            row(NotificationKind::Mention, Some(unknown), at(300), false),
            row(NotificationKind::Mention, Some(known), at(200), false),
        ];

        let summary = NotificationService::summarize(&rows, &actors);
        let group = &summary.groups[0];
        assert_eq!(group.unread_count, 3);
        assert_eq!(group.latest_actors.len(), 1);
        assert_eq!(group.latest_actors[0].id, known);
    }

    #[test]
    fn seen_rows_never_contribute_preview_actors() {
        let a = Uuid::new_v4();
        let mut actors = HashMap::new();
        actors.insert(a, profile(a, "Ada"));

        let rows = vec![
            row(NotificationKind::Repost, Some(a), at(200), true),
            row(NotificationKind::Repost, None, at(100), false),
        ];

        let summary = NotificationService::summarize(&rows, &actors);
        let group = &summary.groups[0];
        assert_eq!(group.unread_count, 1);
        assert!(group.latest_actors.is_empty());
        // The newest row of the kind drives latest_at even when seen.
        assert_eq!(group.latest_at, at(200));
    }

    #[test]
    fn latest_entity_comes_from_the_newest_row_of_the_kind() {
        let entity = Uuid::new_v4();
        let mut newest = row(NotificationKind::Mention, None, at(500), false);
        newest.entity_type = Some("post".to_string());
        newest.entity_id = Some(entity);
        let older = row(NotificationKind::Mention, None, at(100), false);

        let summary = NotificationService::summarize(&[newest, older], &HashMap::new());
        let group = &summary.groups[0];
        assert_eq!(group.latest_entity_type.as_deref(), Some("post"));
        assert_eq!(group.latest_entity_id, Some(entity));
        assert_eq!(group.latest_data, None);
    }
}
