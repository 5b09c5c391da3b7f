use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sampleidx::{
    Config,
    handlers::{AppState, create_router},
    storage::LocalStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let schema = Arc::new(config.load_schema()?);
    let storage = Arc::new(LocalStorage::new(config.data_dir.clone(), schema.version()));
    let state = AppState::new(storage, schema.clone(), config.max_variants);

    let app = create_router(state);
    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = config.bind_address();
    tracing::info!("Starting sampleidx server on {}", addr);
    tracing::info!("Data directory: {:?}", config.data_dir);
    tracing::info!(
        "Schema version {} with {}-bit file index entries",
        schema.version(),
        schema.file_index().entry_bits()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
