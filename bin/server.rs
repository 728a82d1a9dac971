// Purse Tracker - Web Server
// JSON API with Axum

use anyhow::{Context, Result};
use purse_tracker::api::{router, AppState};
use purse_tracker::logging::init_logging;
use purse_tracker::{open_database, Config, ConsoleMailer};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    println!("🌐 Purse Tracker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env().context("Invalid configuration")?;

    // Open database
    let db_path = Path::new(&config.database_path);
    let conn = open_database(db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    println!("✓ Database opened: {:?}", db_path);

    let addr = config.bind_addr.clone();
    let site_url = config.site_url.clone();

    // Create shared state
    let state = AppState::new(conn, config, Arc::new(ConsoleMailer));
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "listening");
    println!("\n🚀 Server running on {}", site_url);
    println!("   API: {}/api/tracker/expenditures", site_url);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
