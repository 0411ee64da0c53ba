use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::AuthedUser,
    services::{ConversationService, DirectResolver},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/direct", post(create_direct))
        .route("/conversations/group", post(create_group))
        .route("/conversations/:id/read", post(mark_read))
        .route("/conversations/:id/pin", post(set_pinned))
        .route("/conversations/:id/mute", post(mute))
}

#[derive(Debug, Deserialize)]
struct CreateDirectRequest {
    other_user_id: Uuid,
}

async fn create_direct(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Json(body): Json<CreateDirectRequest>,
) -> AppResult<Json<Value>> {
    let conversation = DirectResolver::resolve(&state.db, user_id, body.other_user_id).await?;
    Ok(Json(json!({ "conversation": conversation })))
}

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    title: Option<String>,
    participant_ids: Vec<Uuid>,
}

async fn create_group(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Json(body): Json<CreateGroupRequest>,
) -> AppResult<Json<Value>> {
    let conversation = ConversationService::create_group(
        &state.db,
        user_id,
        body.title.as_deref(),
        &body.participant_ids,
    )
    .await?;
    Ok(Json(json!({ "conversation": conversation })))
}

async fn list_conversations(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
) -> AppResult<Json<Value>> {
    let items = ConversationService::list_for_user(&state.db, user_id).await?;
    Ok(Json(json!({ "items": items })))
}

#[derive(Debug, Default, Deserialize)]
struct MarkReadRequest {
    last_read_message_id: Option<Uuid>,
}

async fn mark_read(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<MarkReadRequest>,
) -> AppResult<Json<Value>> {
    ConversationService::mark_read(
        &state.db,
        state.fanout.as_ref(),
        conversation_id,
        user_id,
        body.last_read_message_id,
    )
    .await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct PinRequest {
    pinned: bool,
}

async fn set_pinned(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<PinRequest>,
) -> AppResult<Json<Value>> {
    ConversationService::set_pinned(&state.db, conversation_id, user_id, body.pinned).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Default, Deserialize)]
struct MuteRequest {
    mute_for_seconds: Option<i64>,
}

async fn mute(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<MuteRequest>,
) -> AppResult<Json<Value>> {
    let muted_until =
        ConversationService::mute(&state.db, conversation_id, user_id, body.mute_for_seconds)
            .await?;
    Ok(Json(json!({ "ok": true, "muted_until": muted_until })))
}
