use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod handlers;
pub mod pubsub;

pub use events::{ClientEvent, PushEvent};

use crate::metrics;

/// Per-user logical channels. Every connection a user holds joins the same
/// channel; publishing addresses the user, not a connection.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    // user_id -> (connection_id, sender) per open connection
    inner: Arc<RwLock<HashMap<Uuid, Vec<(Uuid, UnboundedSender<Message>)>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the user's channel with a fresh connection. Returns the
    /// connection id (needed for teardown) and the outbound receiver.
    pub async fn join(&self, user_id: Uuid) -> (Uuid, UnboundedReceiver<Message>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.entry(user_id).or_default().push((connection_id, tx));
        (connection_id, rx)
    }

    /// Remove one connection; the user's channel disappears with its last
    /// connection.
    pub async fn leave(&self, user_id: Uuid, connection_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&user_id) {
            list.retain(|(id, _)| *id != connection_id);
            if list.is_empty() {
                guard.remove(&user_id);
            }
        }
    }

    /// Deliver to every open connection on the user's channel. A user with
    /// no connections is a silent no-op; closed connections are pruned.
    pub async fn publish(&self, user_id: Uuid, msg: Message) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&user_id) {
            list.retain(|(_, sender)| sender.send(msg.clone()).is_ok());
            if list.is_empty() {
                guard.remove(&user_id);
            }
        }
    }

    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.get(&user_id).map(|v| v.len()).unwrap_or(0)
    }

    pub async fn total_connections(&self) -> usize {
        let guard = self.inner.read().await;
        guard.values().map(|v| v.len()).sum()
    }
}

/// The sole fanout primitive. Implementations must be non-blocking and
/// at-most-once: an offline recipient is a no-op, never an error.
#[async_trait]
pub trait Fanout: Send + Sync {
    async fn emit_to_user(&self, user_id: Uuid, event: PushEvent);
}

/// Local delivery plus a Redis publish so sibling instances can deliver to
/// connections they hold. Redis failures degrade to local-only delivery.
pub struct RedisFanout {
    registry: ChannelRegistry,
    redis: redis::Client,
    instance_id: Uuid,
}

impl RedisFanout {
    pub fn new(registry: ChannelRegistry, redis: redis::Client, instance_id: Uuid) -> Self {
        Self {
            registry,
            redis,
            instance_id,
        }
    }
}

#[async_trait]
impl Fanout for RedisFanout {
    async fn emit_to_user(&self, user_id: Uuid, event: PushEvent) {
        let frame = event.to_frame();
        metrics::event_published(event.event_type());

        self.registry
            .publish(user_id, Message::Text(frame.clone()))
            .await;

        if let Err(e) = pubsub::publish(&self.redis, self.instance_id, user_id, &frame).await {
            tracing::warn!(error = %e, user_id = %user_id, "redis publish failed, delivered locally only");
        }
    }
}

/// Local-only fanout, used when no Redis bridge is wanted (tests mostly).
pub struct LocalFanout {
    registry: ChannelRegistry,
}

impl LocalFanout {
    pub fn new(registry: ChannelRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Fanout for LocalFanout {
    async fn emit_to_user(&self, user_id: Uuid, event: PushEvent) {
        metrics::event_published(event.event_type());
        self.registry
            .publish(user_id, Message::Text(event.to_frame()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::NotificationKind;

    #[tokio::test]
    async fn join_then_publish_delivers() {
        let registry = ChannelRegistry::new();
        let user_id = Uuid::new_v4();
        let (_conn, mut rx) = registry.join(user_id).await;

        registry
            .publish(user_id, Message::Text("frame".to_string()))
            .await;

        match rx.recv().await {
            Some(Message::Text(text)) => assert_eq!(text, "frame"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_connection_of_the_user_receives() {
        let registry = ChannelRegistry::new();
        let user_id = Uuid::new_v4();
        let (_c1, mut rx1) = registry.join(user_id).await;
        let (_c2, mut rx2) = registry.join(user_id).await;

        assert_eq!(registry.connection_count(user_id).await, 2);

        registry
            .publish(user_id, Message::Text("hello".to_string()))
            .await;

        assert!(matches!(rx1.recv().await, Some(Message::Text(t)) if t == "hello"));
        assert!(matches!(rx2.recv().await, Some(Message::Text(t)) if t == "hello"));
    }

    #[tokio::test]
    async fn publish_to_offline_user_is_a_noop() {
        let registry = ChannelRegistry::new();
        registry
            .publish(Uuid::new_v4(), Message::Text("lost".to_string()))
            .await;
        assert_eq!(registry.total_connections().await, 0);
    }

    #[tokio::test]
    async fn other_users_do_not_receive() {
        let registry = ChannelRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (_ca, mut rx_a) = registry.join(a).await;
        let (_cb, mut rx_b) = registry.join(b).await;

        registry.publish(a, Message::Text("for a".to_string())).await;

        assert!(matches!(rx_a.recv().await, Some(Message::Text(t)) if t == "for a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_tears_down_membership() {
        let registry = ChannelRegistry::new();
        let user_id = Uuid::new_v4();
        let (conn, _rx) = registry.join(user_id).await;

        registry.leave(user_id, conn).await;
        assert_eq!(registry.connection_count(user_id).await, 0);
        assert_eq!(registry.total_connections().await, 0);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_publish() {
        let registry = ChannelRegistry::new();
        let user_id = Uuid::new_v4();
        let (_c1, rx1) = registry.join(user_id).await;
        let (_c2, mut rx2) = registry.join(user_id).await;
        drop(rx1);

        registry
            .publish(user_id, Message::Text("still here".to_string()))
            .await;

        assert_eq!(registry.connection_count(user_id).await, 1);
        assert!(matches!(rx2.recv().await, Some(Message::Text(t)) if t == "still here"));
    }

    #[tokio::test]
    async fn local_fanout_delivers_frames() {
        let registry = ChannelRegistry::new();
        let fanout = LocalFanout::new(registry.clone());
        let user_id = Uuid::new_v4();
        let (_conn, mut rx) = registry.join(user_id).await;

        fanout
            .emit_to_user(
                user_id,
                PushEvent::NotificationsDirty {
                    kind: NotificationKind::Follow,
                    created_at: Utc::now(),
                },
            )
            .await;

        let Some(Message::Text(frame)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "notifications:dirty");
    }
}
