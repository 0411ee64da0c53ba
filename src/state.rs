use crate::{
    config::Config,
    services::storage::MediaStorage,
    websocket::{ChannelRegistry, Fanout},
};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub registry: ChannelRegistry,
    pub fanout: Arc<dyn Fanout>,
    pub storage: Arc<dyn MediaStorage>,
    pub config: Arc<Config>,
}
