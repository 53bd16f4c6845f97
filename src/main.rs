use tracing_subscriber::EnvFilter;

use filmgraph_api::api::{create_router, AppState};
use filmgraph_api::config::Config;
use filmgraph_api::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("filmgraph_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    if config.run_migrations {
        db::postgres::run_migrations(&pool).await?;
    }

    let state = AppState::postgres(pool);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
