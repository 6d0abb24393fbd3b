use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use studyhall_api::storage::MaterialStore;
use studyhall_api::{AppState, AppStateInner, cleanup};

const DEFAULT_MAX_MATERIAL_BYTES: u64 = 25 * 1024 * 1024;
const SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyhall=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("STUDYHALL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("STUDYHALL_DB_PATH").unwrap_or_else(|_| "studyhall.db".into());
    let host = std::env::var("STUDYHALL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("STUDYHALL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let material_dir: PathBuf = std::env::var("STUDYHALL_MATERIAL_DIR")
        .unwrap_or_else(|_| "./material-storage".into())
        .into();
    let max_material_bytes: u64 = std::env::var("STUDYHALL_MATERIAL_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_MATERIAL_BYTES);

    // Init database and blob storage
    let db = studyhall_db::Database::open(&PathBuf::from(&db_path))?;
    let store = MaterialStore::new(material_dir).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        store,
        jwt_secret,
        max_material_bytes,
    });

    // Background orphan-blob sweep
    tokio::spawn(cleanup::run_sweep_loop(state.clone(), SWEEP_INTERVAL_SECS));

    let app = studyhall_api::router(state)
        .layer(DefaultBodyLimit::max(max_material_bytes as usize + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Studyhall server listening on {}", addr);
    info!("Material ceiling: {} bytes", max_material_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
