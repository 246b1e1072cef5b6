use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bgzpage::{
    Config, Pager,
    handlers::{AppState, create_router},
    records::TsvParser,
    storage,
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

    let storage_options = config.storage_options();
    let index_location = config.index_location();
    let data = storage::open(&config.data, &storage_options).await?;
    let index = storage::open(&index_location, &storage_options).await?;

    let pager = Arc::new(Pager::new(data, index, config.pager_options()));
    pager.try_initialize().await?;

    let mut parser = TsvParser::new();
    if config.has_header {
        let first = pager.fetch_page_text(1, 1).await?;
        if let Some(columns) = TsvParser::header_from(&first.text) {
            tracing::info!("Columns: {}", columns.join(", "));
            parser = parser.with_columns(columns);
        }
    }

    let state = AppState {
        pager,
        parser: Arc::new(parser),
        page_size: config.page_size,
        data_location: config.data.clone(),
        index_location,
    };

    let app = create_router(state);
    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting bgzpage server on {}", addr);
    tracing::info!("Data file: {}", config.data);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
