//! Common test utilities - ArtbotTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use artbot::bot::ArtBot;
use artbot::{Config, Server};
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Test harness that runs a real artbot server on a random port
pub struct ArtbotTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
    /// Temp directory backing the bot's work dir (cleaned up on drop)
    _temp_dir: TempDir,
}

impl ArtbotTest {
    /// Start a new test server instance with default configuration
    pub async fn start() -> Result<Self> {
        Self::start_with(Config::default()).await
    }

    /// Start a test server with a caller-supplied configuration.
    /// The bind address and temp directory are always overridden so
    /// parallel tests stay isolated.
    pub async fn start_with(mut config: Config) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        config.temp_dir = temp_dir.path().join("work");

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);
        config.bind_addr = addr;

        let server = Arc::new(Server::new(config)?);
        let server_clone = server.clone();

        // Run the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        // Wait for server to be ready
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            handle: Some(handle),
            _temp_dir: temp_dir,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Get direct access to the bot for test setup/assertions
    pub fn bot(&self) -> Arc<ArtBot> {
        self.server.bot()
    }

    /// Shut down gracefully and wait for the server task to finish,
    /// including the final temp sweep.
    pub async fn stop(mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ArtbotTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
