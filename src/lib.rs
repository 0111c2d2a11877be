//! artbot - chat image-generation bot daemon
//!
//! Turns chat prompts (and recently seen reference images) into AI-generated
//! images via the Gemini API, exposed to a host chat framework over HTTP.

pub mod api;
pub mod bot;
pub mod chat;
pub mod config;
pub mod gallery;
pub mod gemini;
pub mod images;
pub mod sweep;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use bot::ArtBot;
pub use config::Config;

/// The artbot server instance
pub struct Server {
    config: Config,
    bot: Arc<ArtBot>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Result<Self> {
        let bot = ArtBot::shared(config.clone())?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            bot,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the bot handle
    pub fn bot(&self) -> Arc<ArtBot> {
        self.bot.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.bot.clone())
    }

    /// Run the server until shutdown, then wind the bot down
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("artbot listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        self.bot.shutdown().await;
        info!("artbot shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
