//! Standalone game-session server binary
//!
//! Usage: cargo run -p tourney_web --bin tourney-web-server

use clap::Parser;
use tourney_web::{Settings, WebServer};

/// Tournament hub game-session backend
#[derive(Parser, Debug)]
#[command(name = "tourney-web-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address, overrides LISTEN_ADDR
    #[arg(long)]
    listen: Option<String>,

    /// Signing service base URL, overrides SIGNER_URL
    #[arg(long)]
    signer_url: Option<String>,

    /// Contract relay base URL, overrides CONTRACT_RELAY_URL
    #[arg(long)]
    relay_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tourney_web::init_logging();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(listen) = args.listen {
        settings.listen_addr = listen;
    }
    if let Some(url) = args.signer_url {
        settings.signer_url = Some(url);
    }
    if let Some(url) = args.relay_url {
        settings.contract_relay_url = Some(url);
    }
    settings.validate()?;

    tracing::info!(
        listen = %settings.listen_addr,
        signer = settings.signer_url.as_deref().unwrap_or("<none>"),
        relay = settings.contract_relay_url.as_deref().unwrap_or("<none>"),
        arena_tick_ms = settings.arena_tick_ms,
        "starting game session server"
    );

    let server = WebServer::new(settings)?;
    let handle = server.start().await?;
    tracing::info!(address = %handle.address(), "server running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
