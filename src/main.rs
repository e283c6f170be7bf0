use imagegen::config::Config;
use imagegen::provider::{ChatImageProvider, ImageProvider};
use imagegen::realtime::ChangeFeed;
use imagegen::server::router::{ImagegenState, imagegen_router};
use imagegen::storage::{FsObjectStore, ObjectStore};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::from_toml();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        loglevel = %cfg.basic.loglevel,
        listen_addr = %cfg.basic.listen_addr,
        listen_port = cfg.basic.listen_port,
        provider_url = %cfg.provider.api_url,
        model = %cfg.provider.model,
        proxy = %cfg.provider.proxy.as_ref().map_or("<none>", |u| u.as_str()),
        storage_root = %cfg.storage.root.display(),
        public_base_url = %cfg.storage.public_base_url
    );
    if cfg.provider.api_key.trim().is_empty() {
        warn!("provider.api_key is empty; generation requests will fail");
    }

    let feed = ChangeFeed::default();
    let db = imagegen::db::spawn(&cfg.basic.database_url, feed.clone()).await?;

    let provider: Arc<dyn ImageProvider> = Arc::new(ChatImageProvider::new(&cfg.provider)?);
    tokio::fs::create_dir_all(&cfg.storage.root).await?;
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(
        cfg.storage.root.clone(),
        cfg.storage.public_base_url.clone(),
    )?);

    let state = ImagegenState::new(db, feed, provider, store, &cfg);
    let app = imagegen_router(state);

    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
