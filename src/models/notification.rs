use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Mention,
    Repost,
    Follow,
    MessageRequest,
}

impl NotificationKind {
    /// Aggregation order for summary groups.
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Mention,
        NotificationKind::Repost,
        NotificationKind::Follow,
        NotificationKind::MessageRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Mention => "mention",
            NotificationKind::Repost => "repost",
            NotificationKind::Follow => "follow",
            NotificationKind::MessageRequest => "message_request",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub data: Option<serde_json::Value>,
    pub seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Compact actor card shown on aggregated notification rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryGroup {
    pub kind: NotificationKind,
    pub unread_count: usize,
    pub latest_at: DateTime<Utc>,
    pub latest_actors: Vec<ActorProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_entity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub unread_total: usize,
    pub groups: Vec<SummaryGroup>,
}
