//! Boots the pool, applies the schema DDL and serves the health/readiness routes.

use monarch_core::{
    apply_migrations, common_routes_with_ready, ensure_database_exists, AppState, PgStore, SchemaModel,
    Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("monarch_core=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let model = Arc::new(SchemaModel::build(settings.schema.clone())?);
    apply_migrations(&pool, &model).await?;
    let store = Arc::new(PgStore::new(pool, settings.schema.clone()));

    let bind = settings.bind;
    let state = AppState::new(store, model, settings);
    let app = common_routes_with_ready(state);
    let listener = TcpListener::bind(bind).await?;
    tracing::info!("monarch listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
