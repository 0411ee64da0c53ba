use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::config::Config;
use crate::error::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn init_pool(config: &Config) -> Result<Pool<Postgres>, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), AppError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| AppError::Config(format!("migrations failed: {e}")))?;
    tracing::info!("Database migrations completed");
    Ok(())
}
