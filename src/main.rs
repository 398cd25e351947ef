use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use silent_auction::{
    api, auth,
    config::AuctionConfig,
    state::AppState,
    store::{read_catalog, DocumentStore, InMemoryStore, JsonFileStore},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "silent_auction=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AuctionConfig::from_env();
    tracing::info!(
        auction = %config.auction_name,
        write_mode = ?config.bid_write_mode,
        "Starting silent auction..."
    );

    let auth_config = Arc::new(auth::AdminAuthConfig::from_env());

    let store: Arc<dyn DocumentStore> = match &config.data_file {
        Some(path) => {
            let store = JsonFileStore::open(path)
                .await
                .expect("Failed to open auction data file");
            tracing::info!(path = %path.display(), "Using file-backed auction document");
            Arc::new(store)
        }
        None => {
            tracing::warn!("AUCTION_DATA_FILE not set, bids and identities are kept in memory only");
            Arc::new(InMemoryStore::new())
        }
    };

    if let Some(path) = &config.items_file {
        match read_catalog(path).await {
            Ok(catalog) => match store.bulk_update_items(catalog).await {
                Ok(count) => tracing::info!(count, "Item catalog loaded"),
                Err(e) => tracing::error!("Failed to apply item catalog: {}", e),
            },
            Err(e) => tracing::error!(path = %path.display(), "Failed to read item catalog: {}", e),
        }
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let assets = ServeDir::new(&config.assets_dir);
    let static_files = ServeDir::new(&config.static_dir);

    let state = AppState::with_store(config, store);

    let app = api::router(auth_config)
        .nest_service("/assets", assets)
        .fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
