//! Configuration
//!
//! Provides:
//! - The full option surface with workable defaults
//! - Layered loading: defaults, then a TOML file, then ARTBOT_ env overrides

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini API keys, tried in rotation
    pub api_keys: Vec<String>,
    /// Gemini API base URL
    pub api_base_url: String,
    /// Model used for generation
    pub model: String,
    /// Conversations the bot serves; empty means no restriction
    pub whitelist: Vec<String>,
    /// The bot's own user id, for suppressing self-triggered events
    pub self_id: Option<String>,
    /// Pick a random key order per call instead of round-robin
    pub random_key_selection: bool,
    /// Image references remembered per (user, conversation)
    pub gallery_capacity: usize,
    /// Directory for fetched and generated image files
    pub temp_dir: PathBuf,
    /// Seconds between temp sweeps; 0 disables the background sweep
    pub sweep_interval_secs: u64,
    /// Age in seconds past which swept files are deleted
    pub sweep_max_age_secs: u64,
    /// Numeric bot account id, used for forwarded-bundle attribution
    pub bot_id: Option<u64>,
    /// Display name for forwarded-bundle attribution
    pub bot_name: String,
    /// Style suffix appended to every prompt
    pub prompt_suffix: Option<String>,
    /// Per-request timeout for Gemini calls
    pub request_timeout_secs: u64,
    /// Address the host event surface listens on
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            whitelist: Vec::new(),
            self_id: None,
            random_key_selection: false,
            gallery_capacity: 30,
            temp_dir: std::env::temp_dir().join("artbot"),
            sweep_interval_secs: 21600,
            sweep_max_age_secs: 259200,
            bot_id: None,
            bot_name: "artbot".to_string(),
            prompt_suffix: None,
            request_timeout_secs: 120,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

impl Config {
    /// Load configuration: defaults, merged with a TOML file when given,
    /// merged with `ARTBOT_`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Config, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file_exact(path));
        }
        let mut config: Config = figment.merge(Env::prefixed("ARTBOT_")).extract()?;
        config.normalize();
        Ok(config)
    }

    /// Whether the bot serves this conversation
    pub fn conversation_allowed(&self, conversation_id: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|id| id == conversation_id)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_secs(self.sweep_max_age_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Trim keys and drop empty entries
    fn normalize(&mut self) {
        self.api_keys = self
            .api_keys
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(String::from)
            .collect();
    }
}
