//! Realtime event vocabulary.
//!
//! Every frame on the socket is JSON with the same top-level shape:
//!
//! ```json
//! {
//!     "event": "message:new",
//!     "payload": { ... }
//! }
//! ```
//!
//! Serialization of server pushes and parsing of client frames both live
//! here so the wire shape has exactly one definition.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::models::{MessageDto, NotificationKind};

/// Server -> client pushes, addressed to per-user channels.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// A message was accepted into a conversation the recipient belongs to.
    MessageNew { message: MessageDto },
    /// Another participant advanced their read watermark.
    MessageRead {
        conversation_id: Uuid,
        reader_id: Uuid,
        last_read_message_id: Option<Uuid>,
    },
    /// Typing indicator relay.
    Typing {
        conversation_id: Uuid,
        from_user_id: Uuid,
        on: bool,
    },
    /// Delivery receipt relay.
    Delivered {
        conversation_id: Uuid,
        message_id: Uuid,
        by_user_id: Uuid,
    },
    /// The recipient's notification summary went stale; clients re-fetch
    /// rather than trusting push content.
    NotificationsDirty {
        kind: NotificationKind,
        created_at: DateTime<Utc>,
    },
    /// Liveness reply, connection-local.
    Pong { data: serde_json::Value },
}

impl PushEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PushEvent::MessageNew { .. } => "message:new",
            PushEvent::MessageRead { .. } => "message:read",
            PushEvent::Typing { .. } => "messages:typing",
            PushEvent::Delivered { .. } => "messages:delivered",
            PushEvent::NotificationsDirty { .. } => "notifications:dirty",
            PushEvent::Pong { .. } => "pong",
        }
    }

    /// Echo for an inbound ping: the client's payload with the verified
    /// user id stamped in.
    pub fn pong(body: serde_json::Map<String, serde_json::Value>, user_id: Uuid) -> Self {
        let mut data = body;
        data.insert("user_id".to_string(), json!(user_id));
        PushEvent::Pong {
            data: serde_json::Value::Object(data),
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            PushEvent::MessageNew { message } => json!({ "message": message }),
            PushEvent::MessageRead {
                conversation_id,
                reader_id,
                last_read_message_id,
            } => json!({
                "conversation_id": conversation_id,
                "reader_id": reader_id,
                "last_read_message_id": last_read_message_id,
            }),
            PushEvent::Typing {
                conversation_id,
                from_user_id,
                on,
            } => json!({
                "conversation_id": conversation_id,
                "from_user_id": from_user_id,
                "on": on,
            }),
            PushEvent::Delivered {
                conversation_id,
                message_id,
                by_user_id,
            } => json!({
                "conversation_id": conversation_id,
                "message_id": message_id,
                "by_user_id": by_user_id,
            }),
            PushEvent::NotificationsDirty { kind, created_at } => json!({
                "kind": kind,
                "created_at": created_at,
            }),
            PushEvent::Pong { data } => data.clone(),
        }
    }

    pub fn to_frame(&self) -> String {
        json!({
            "event": self.event_type(),
            "payload": self.payload(),
        })
        .to_string()
    }
}

/// Client -> server frames. Membership is re-checked against the store on
/// every relay; nothing about the sender's conversations is cached on the
/// connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Typing {
        conversation_id: Uuid,
        on: bool,
    },
    Delivered {
        conversation_id: Uuid,
        message_id: Uuid,
    },
    Ping {
        body: serde_json::Map<String, serde_json::Value>,
    },
}

/// Lenient frame parser: anything that is not a well-formed known event
/// yields `None` and the frame is dropped.
pub fn parse_client_frame(text: &str) -> Option<ClientEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let event = value.get("event")?.as_str()?;
    let payload = value.get("payload").cloned().unwrap_or(json!({}));

    fn uuid_field(payload: &serde_json::Value, field: &str) -> Option<Uuid> {
        Uuid::parse_str(payload.get(field)?.as_str()?).ok()
    }

    match event {
        "messages:typing" => Some(ClientEvent::Typing {
            conversation_id: uuid_field(&payload, "conversation_id")?,
            on: payload.get("on").and_then(|v| v.as_bool()).unwrap_or(false),
        }),
        "messages:delivered" => Some(ClientEvent::Delivered {
            conversation_id: uuid_field(&payload, "conversation_id")?,
            message_id: uuid_field(&payload, "message_id")?,
        }),
        "ping" => Some(ClientEvent::Ping {
            body: payload.as_object().cloned().unwrap_or_default(),
        }),
        _ => None,
    }
}
