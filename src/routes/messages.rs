use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::AuthedUser,
    services::{message_service::SendMessageRequest, MessageService},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations/:id/messages",
            get(list_messages).post(send_message),
        )
        .route(
            "/conversations/:id/messages/:message_id",
            delete(delete_message),
        )
}

#[derive(Debug, Default, Deserialize)]
struct ListMessagesQuery {
    before_id: Option<Uuid>,
    limit: Option<i64>,
}

async fn list_messages(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> AppResult<Json<Value>> {
    let items = MessageService::list(
        &state.db,
        conversation_id,
        user_id,
        query.limit,
        query.before_id,
    )
    .await?;
    Ok(Json(json!({ "items": items })))
}

async fn send_message(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> AppResult<Json<Value>> {
    let message = MessageService::send(
        &state.db,
        state.fanout.as_ref(),
        conversation_id,
        user_id,
        body,
    )
    .await?;
    Ok(Json(json!({ "message": message })))
}

async fn delete_message(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    MessageService::delete(&state.db, conversation_id, message_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
