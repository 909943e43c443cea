// Brokerage Ledger - Web Server
// REST API with Axum, plus the static front-end

use anyhow::{Context, Result};
use brokerage_ledger::api::{router, AppState};
use brokerage_ledger::{setup_database, Config};
use rusqlite::Connection;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    brokerage_ledger::init_tracing("info,tower_http=debug");

    let config = Config::from_env()?;

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    setup_database(&conn)?;
    info!(path = %config.db_path.display(), "database opened");

    if !config.static_dir.exists() {
        warn!(dir = %config.static_dir.display(), "static directory missing, only /api is served");
    }
    let static_files = ServeDir::new(&config.static_dir)
        .not_found_service(ServeFile::new(config.static_dir.join("index.html")));

    let bind_addr = config.bind_addr.clone();
    let app = router(AppState::new(conn, config)).fallback_service(static_files);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!(addr = %bind_addr, "server listening");
    println!("🚀 Brokerage server running on http://{}", bind_addr);
    println!("   API: http://{}/api/health", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
