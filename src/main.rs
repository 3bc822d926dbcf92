use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_gateway::backend::BackendClient;
use news_gateway::config::Config;
use news_gateway::dispatcher::Dispatcher;
use news_gateway::registry::SiteRegistry;
use news_gateway::routes::{self, AppState};
use news_gateway::transport::HttpConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "gateway.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} sites from {}",
        config.sites.len(),
        config_path
    );

    let registry = Arc::new(SiteRegistry::new(config.sites.clone())?);
    let client = Arc::new(BackendClient::new(Arc::new(HttpConnector::default())));
    let dispatcher = Arc::new(Dispatcher::from_config(&config, registry, client.clone()));

    let state = Arc::new(AppState { dispatcher });
    let app = routes::router(state, &config.static_dir);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Server starting on http://{}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.shutdown();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
