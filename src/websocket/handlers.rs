use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    metrics,
    middleware::auth,
    services::conversation_service::ConversationService,
    state::AppState,
    websocket::events::{parse_client_frame, ClientEvent, PushEvent},
};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub auth: Option<String>,
    pub token: Option<String>,
}

/// Credential lookup order for the handshake: the `auth` query field, then
/// an Authorization bearer header, then the legacy `token` query parameter.
/// The first non-empty value wins; an empty slot falls through to the next.
pub fn extract_credential(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = params.auth.as_deref() {
        if !auth.is_empty() {
            return Some(auth.to_string());
        }
    }

    if let Some(header) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if header.len() > 7 && header[..7].eq_ignore_ascii_case("bearer ") {
            let token = header[7..].trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    params
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
}

/// GET /ws. The credential is verified before the upgrade so rejected
/// clients get a plain 401 instead of a socket that closes on them.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let verified = extract_credential(&params, &headers)
        .ok_or(AppError::Unauthorized)
        .and_then(|token| auth::authenticate(&token, &state.config.jwt_secret));

    let user_id = match verified {
        Ok(user_id) => user_id,
        Err(_) => {
            warn!("websocket handshake rejected: missing or invalid credential");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, user_id, socket))
}

async fn handle_socket(state: AppState, user_id: Uuid, socket: WebSocket) {
    metrics::ws_connection_opened();
    let (connection_id, mut rx) = state.registry.join(user_id).await;
    debug!(user_id = %user_id, connection_id = %connection_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = receiver.next() => {
                if !handle_incoming(&state, user_id, &mut sender, inbound).await {
                    break;
                }
            }
        }
    }

    state.registry.leave(user_id, connection_id).await;
    metrics::ws_connection_closed();
    debug!(user_id = %user_id, connection_id = %connection_id, "websocket disconnected");
}

/// Returns false when the connection should be torn down.
async fn handle_incoming(
    state: &AppState,
    user_id: Uuid,
    sender: &mut SplitSink<WebSocket, Message>,
    inbound: Option<Result<Message, axum::Error>>,
) -> bool {
    match inbound {
        Some(Ok(Message::Text(text))) => {
            // Unknown or malformed frames are dropped without a reply.
            if let Some(event) = parse_client_frame(&text) {
                handle_client_event(state, user_id, sender, event).await;
            }
            true
        }
        Some(Ok(Message::Close(_))) | None => false,
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            debug!(error = %e, user_id = %user_id, "websocket receive error");
            false
        }
    }
}

async fn handle_client_event(
    state: &AppState,
    user_id: Uuid,
    sender: &mut SplitSink<WebSocket, Message>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Typing {
            conversation_id,
            on,
        } => {
            relay(
                state,
                user_id,
                conversation_id,
                PushEvent::Typing {
                    conversation_id,
                    from_user_id: user_id,
                    on,
                },
            )
            .await;
        }
        ClientEvent::Delivered {
            conversation_id,
            message_id,
        } => {
            relay(
                state,
                user_id,
                conversation_id,
                PushEvent::Delivered {
                    conversation_id,
                    message_id,
                    by_user_id: user_id,
                },
            )
            .await;
        }
        ClientEvent::Ping { body } => {
            // Pong is connection-local, not a channel publish.
            let frame = PushEvent::pong(body, user_id).to_frame();
            let _ = sender.send(Message::Text(frame)).await;
        }
    }
}

/// Relay an ephemeral event to the other participants. A sender who is not
/// a member of the conversation is ignored rather than disconnected.
async fn relay(state: &AppState, user_id: Uuid, conversation_id: Uuid, event: PushEvent) {
    match ConversationService::is_participant(&state.db, conversation_id, user_id).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(
                user_id = %user_id,
                conversation_id = %conversation_id,
                "relay from non-participant dropped"
            );
            return;
        }
        Err(e) => {
            warn!(error = %e, "membership check failed, dropping relay");
            return;
        }
    }

    match ConversationService::other_participants(&state.db, conversation_id, user_id).await {
        Ok(recipients) => {
            for recipient in recipients {
                state.fanout.emit_to_user(recipient, event.clone()).await;
            }
        }
        Err(e) => warn!(error = %e, "failed to resolve relay recipients"),
    }
}
