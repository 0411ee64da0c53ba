pub mod conversations;
pub mod media;
pub mod messages;
pub mod notifications;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{metrics, middleware::auth::auth_middleware, state::AppState, websocket};

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(conversations::routes())
        .merge(messages::routes())
        .merge(notifications::routes())
        .merge(media::routes())
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        // The socket endpoint authenticates its own handshake: the
        // credential may arrive by query parameter, which the bearer
        // middleware would reject.
        .route("/ws", get(websocket::handlers::ws_handler));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/media/:file_name", get(media::serve_media))
        .nest("/api/v1", api)
        .layer(from_fn(metrics::track_http_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
