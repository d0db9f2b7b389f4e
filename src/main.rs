use book_recommender::{
    config::Config,
    routes::{create_router, AppState},
    services::CsvDatasetSource,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    // The dataset is loaded once and shared read-only by every request
    let source = CsvDatasetSource::new(&config.datasets_dir);
    let state = AppState::load(&source, config.force_refresh).await?;

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
