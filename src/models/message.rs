use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Gif,
    Media,
    Sticker,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Gif => "gif",
            MessageKind::Media => "media",
            MessageKind::Sticker => "sticker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "gif" => Some(MessageKind::Gif),
            "media" => Some(MessageKind::Media),
            "sticker" => Some(MessageKind::Sticker),
            _ => None,
        }
    }
}

/// A validated message body. Exactly one slot is populated, matching the
/// declared kind; construction is the single place the kind/field matrix
/// is enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    Text(String),
    Gif(String),
    Media(String),
    Sticker(String),
}

impl MessagePayload {
    pub fn from_parts(
        kind: MessageKind,
        text: Option<&str>,
        gif_url: Option<&str>,
        media_url: Option<&str>,
        sticker_url: Option<&str>,
    ) -> Result<Self, AppError> {
        fn required(value: Option<&str>, field: &str) -> Result<String, AppError> {
            let trimmed = value.unwrap_or("").trim();
            if trimmed.is_empty() {
                return Err(AppError::BadRequest(format!("{field} is required")));
            }
            Ok(trimmed.to_string())
        }

        match kind {
            MessageKind::Text => Ok(MessagePayload::Text(required(text, "text")?)),
            MessageKind::Gif => Ok(MessagePayload::Gif(required(gif_url, "gif_url")?)),
            MessageKind::Media => Ok(MessagePayload::Media(required(media_url, "media_url")?)),
            MessageKind::Sticker => {
                Ok(MessagePayload::Sticker(required(sticker_url, "sticker_url")?))
            }
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::Text(_) => MessageKind::Text,
            MessagePayload::Gif(_) => MessageKind::Gif,
            MessagePayload::Media(_) => MessageKind::Media,
            MessagePayload::Sticker(_) => MessageKind::Sticker,
        }
    }

    /// Column values in (text, gif_url, media_url, sticker_url) order.
    pub fn into_columns(
        self,
    ) -> (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    ) {
        match self {
            MessagePayload::Text(v) => (Some(v), None, None, None),
            MessagePayload::Gif(v) => (None, Some(v), None, None),
            MessagePayload::Media(v) => (None, None, Some(v), None),
            MessagePayload::Sticker(v) => (None, None, None, Some(v)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub kind: String,
    pub text: Option<String>,
    pub gif_url: Option<String>,
    pub media_url: Option<String>,
    pub sticker_url: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_display_name: Option<String>,
    pub kind: String,
    pub text: Option<String>,
    pub gif_url: Option<String>,
    pub media_url: Option<String>,
    pub sticker_url: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageDto {
    /// Tombstoned rows keep their id, sender, kind and timestamp so clients
    /// can render them in order, but every payload field is nulled.
    pub fn from_message(m: Message, sender_display_name: Option<String>) -> Self {
        let deleted = m.is_deleted;
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            sender_display_name,
            kind: m.kind,
            text: if deleted { None } else { m.text },
            gif_url: if deleted { None } else { m.gif_url },
            media_url: if deleted { None } else { m.media_url },
            sticker_url: if deleted { None } else { m.sticker_url },
            reply_to_message_id: m.reply_to_message_id,
            is_deleted: deleted,
            created_at: m.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: MessageKind, is_deleted: bool) -> Message {
        let (text, gif_url, media_url, sticker_url) = match kind {
            MessageKind::Text => (Some("hello".to_string()), None, None, None),
            MessageKind::Gif => (None, Some("https://gif.example/g".to_string()), None, None),
            MessageKind::Media => (None, None, Some("https://cdn.example/m".to_string()), None),
            MessageKind::Sticker => (None, None, None, Some("https://cdn.example/s".to_string())),
        };
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            kind: kind.as_str().to_string(),
            text,
            gif_url,
            media_url,
            sticker_url,
            reply_to_message_id: None,
            is_deleted,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn text_payload_requires_non_blank_text() {
        let err = MessagePayload::from_parts(MessageKind::Text, Some("   "), None, None, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "text is required");

        let ok = MessagePayload::from_parts(MessageKind::Text, Some("  hi  "), None, None, None)
            .unwrap();
        assert_eq!(ok, MessagePayload::Text("hi".to_string()));
    }

    #[test]
    fn each_kind_requires_its_own_slot() {
        let err =
            MessagePayload::from_parts(MessageKind::Gif, Some("text"), None, None, None).unwrap_err();
        assert_eq!(err.to_string(), "gif_url is required");

        let err = MessagePayload::from_parts(MessageKind::Media, None, Some("u"), None, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "media_url is required");

        let err = MessagePayload::from_parts(MessageKind::Sticker, None, None, Some("u"), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "sticker_url is required");
    }

    #[test]
    fn mismatched_fields_are_dropped_not_stored() {
        let payload = MessagePayload::from_parts(
            MessageKind::Gif,
            Some("stray text"),
            Some("https://gif.example/g"),
            Some("stray media"),
            None,
        )
        .unwrap();
        let (text, gif_url, media_url, sticker_url) = payload.into_columns();
        assert_eq!(text, None);
        assert_eq!(gif_url.as_deref(), Some("https://gif.example/g"));
        assert_eq!(media_url, None);
        assert_eq!(sticker_url, None);
    }

    #[test]
    fn parse_rejects_unknown_kinds() {
        assert_eq!(MessageKind::parse("gif"), Some(MessageKind::Gif));
        assert_eq!(MessageKind::parse("video"), None);
        assert_eq!(MessageKind::parse(""), None);
    }

    #[test]
    fn payload_round_trips_kind() {
        for kind in [
            MessageKind::Text,
            MessageKind::Gif,
            MessageKind::Media,
            MessageKind::Sticker,
        ] {
            let payload =
                MessagePayload::from_parts(kind, Some("v"), Some("v"), Some("v"), Some("v"))
                    .unwrap();
            assert_eq!(payload.kind(), kind);
        }
    }

    #[test]
    fn tombstone_hides_payload_but_keeps_metadata() {
        let m = message(MessageKind::Text, true);
        let id = m.id;
        let created_at = m.created_at;
        let dto = MessageDto::from_message(m, Some("Ada".to_string()));

        assert_eq!(dto.id, id);
        assert_eq!(dto.created_at, created_at);
        assert!(dto.is_deleted);
        assert_eq!(dto.text, None);
        assert_eq!(dto.gif_url, None);
        assert_eq!(dto.media_url, None);
        assert_eq!(dto.sticker_url, None);
        assert_eq!(dto.sender_display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn live_message_keeps_payload() {
        let m = message(MessageKind::Media, false);
        let dto = MessageDto::from_message(m, None);
        assert_eq!(dto.media_url.as_deref(), Some("https://cdn.example/m"));
        assert!(!dto.is_deleted);
    }
}
