//! artbotd - chat image-generation bot daemon

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use artbot::{Config, Server};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gemini-backed chat image generation daemon
#[derive(Parser, Debug)]
#[command(name = "artbotd", version, about = "Chat image-generation bot daemon")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artbot=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments and load config
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // Create the server and wire ctrl-c to graceful shutdown
    let server = Arc::new(Server::new(config)?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
