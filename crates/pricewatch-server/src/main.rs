use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pricewatch_client::{ReqwestDelivery, ReqwestTargetSource};
use pricewatch_core::events::{TracingEventSink, TracingNotifier};
use pricewatch_core::{CrawlEvent, CrawlerDeps, EngineOptions, PageHost, Settings, launch};
use pricewatch_server::routes;
use pricewatch_server::state::AppState;
use pricewatch_store::{StateDir, StoreConfig};

const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricewatch=info".parse()?))
        .with_target(false)
        .init();

    let settings_path = std::env::var("PRICEWATCH_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config/settings.json"));
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    #[cfg(feature = "browser")]
    {
        let headless = std::env::var("PRICEWATCH_HEADLESS").map_or(true, |v| v != "false");
        let host = pricewatch_client::BrowserPageHost::launch(headless).await?;
        serve(host, settings).await
    }
    #[cfg(not(feature = "browser"))]
    {
        let host = pricewatch_client::HttpPageHost::with_timeout(settings.extract_timeout())?;
        serve(host, settings).await
    }
}

async fn serve<H: PageHost + 'static>(host: H, settings: Settings) -> anyhow::Result<()> {
    let admin_token = std::env::var("PRICEWATCH_ADMIN_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());
    if admin_token.is_none() {
        tracing::warn!("PRICEWATCH_ADMIN_TOKEN not set, control API is disabled");
    }
    let port = std::env::var("PRICEWATCH_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let state_dir = StateDir::open(&StoreConfig::from_env()?).await?;
    let (events, _) = broadcast::channel::<CrawlEvent>(EVENT_BUFFER);
    let deps = CrawlerDeps {
        host,
        store: state_dir.checkpoint_store().await?,
        schedule_store: state_dir.schedule_store().await?,
        delivery: ReqwestDelivery::new(&settings.api.delivery_url)?,
        targets: ReqwestTargetSource::new(settings.api.collect_url())?,
        events: Arc::new((events.clone(), TracingEventSink)),
        notifier: Arc::new(TracingNotifier),
    };

    let shutdown = CancellationToken::new();
    let crawler = launch(
        deps,
        settings.crawling,
        EngineOptions::from(&settings),
        shutdown.clone(),
    )
    .await?;
    tracing::info!(session = %crawler.session, "Crawl engine ready");

    let state = Arc::new(AppState {
        crawler: crawler.controller.clone(),
        events,
        admin_token,
        shutdown: shutdown.clone(),
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    crawler.join().await;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
