use axum::extract::ws::Message;
use redis::AsyncCommands;
use redis::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::websocket::ChannelRegistry;

/// Cross-instance frame envelope. `origin` lets the publishing instance
/// skip its own loopback, since it already delivered locally.
#[derive(Debug, Serialize, Deserialize)]
struct BridgeEnvelope {
    origin: Uuid,
    user_id: Uuid,
    frame: String,
}

fn channel_for_user(id: Uuid) -> String {
    format!("user:{}", id)
}

pub async fn publish(
    client: &Client,
    instance_id: Uuid,
    user_id: Uuid,
    frame: &str,
) -> redis::RedisResult<()> {
    let envelope = BridgeEnvelope {
        origin: instance_id,
        user_id,
        frame: frame.to_string(),
    };
    let payload = serde_json::to_string(&envelope).map_err(|e| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "envelope encode", e.to_string()))
    })?;

    let mut conn = client.get_multiplexed_async_connection().await?;
    conn.publish::<_, _, ()>(channel_for_user(user_id), payload)
        .await
}

/// Listen for frames published by sibling instances and replay them into
/// the local registry. Runs until the Redis connection drops.
pub async fn start_psub_listener(
    client: Client,
    registry: ChannelRegistry,
    instance_id: Uuid,
) -> redis::RedisResult<()> {
    // PubSub requires a dedicated connection, not multiplexed
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe("user:*").await?;
    let mut stream = pubsub.on_message();
    use futures_util::StreamExt;
    while let Some(msg) = stream.next().await {
        let payload: String = msg.get_payload()?;
        let envelope: BridgeEnvelope = match serde_json::from_str(&payload) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed bridge envelope");
                continue;
            }
        };
        if envelope.origin == instance_id {
            continue;
        }
        registry
            .publish(envelope.user_id, Message::Text(envelope.frame))
            .await;
    }
    Ok(())
}
