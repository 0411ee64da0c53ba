use std::sync::Arc;

use uuid::Uuid;

use chat_service::{
    config::Config,
    db,
    error::AppError,
    logging, routes,
    services::LocalMediaStorage,
    state::AppState,
    websocket::{pubsub, ChannelRegistry, Fanout, RedisFanout},
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Configuration loaded");

    let pool = db::init_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let redis = redis::Client::open(config.redis_url.as_str())
        .map_err(|e| AppError::Config(format!("redis: {e}")))?;

    let registry = ChannelRegistry::new();
    let instance_id = Uuid::new_v4();
    let fanout: Arc<dyn Fanout> = Arc::new(RedisFanout::new(
        registry.clone(),
        redis.clone(),
        instance_id,
    ));
    let storage = Arc::new(LocalMediaStorage::new(
        config.media_root.clone(),
        config.media_base_url.clone(),
    ));

    // Replay frames published by sibling instances into the local registry.
    {
        let client = redis.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = pubsub::start_psub_listener(client, registry, instance_id).await {
                tracing::error!(error = %e, "redis pub/sub listener exited");
            }
        });
    }

    let state = AppState {
        db: pool,
        registry,
        fanout,
        storage,
        config: config.clone(),
    };

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "starting chat-service");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
