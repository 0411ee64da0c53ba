use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::AuthedUser,
    models::{NotificationKind, NotificationSummary},
    services::NotificationService,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/summary", get(summary))
        .route("/notifications/mark-seen", post(mark_seen))
}

async fn summary(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
) -> AppResult<Json<NotificationSummary>> {
    let summary = NotificationService::summary(&state.db, user_id).await?;
    Ok(Json(summary))
}

#[derive(Debug, Default, Deserialize)]
struct MarkSeenRequest {
    kind: Option<String>,
}

async fn mark_seen(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Json(body): Json<MarkSeenRequest>,
) -> AppResult<Json<Value>> {
    let kind = match body.kind.as_deref() {
        Some(value) => Some(NotificationKind::parse(value).ok_or_else(|| {
            AppError::BadRequest(
                "kind must be one of mention, repost, follow, message_request".into(),
            )
        })?),
        None => None,
    };

    NotificationService::mark_seen(&state.db, user_id, kind).await?;
    Ok(Json(json!({ "ok": true })))
}
