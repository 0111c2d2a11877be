//! The bot service
//!
//! Provides:
//! - Passive image observation into the per-user gallery
//! - The draw operation: resolve references, dispatch, shape the reply
//! - Lifecycle: owns the temp sweeper, final cleanup on shutdown

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::chat::{reply, ChatEvent, OutboundMessage, Persona};
use crate::config::Config;
use crate::gallery::Gallery;
use crate::gemini::{Dispatcher, GeminiClient, GenerateError, KeyPool};
use crate::images::{ImageRef, Materializer};
use crate::sweep::{self, Sweeper};

/// Sent when generation is requested with no keys configured
pub const NO_KEYS_REPLY: &str =
    "No API keys are configured. Ask an administrator to set artbot's api_keys.";
/// Sent when the safety system rejects a request
pub const SAFETY_REPLY: &str =
    "The request was blocked by the safety system. Try rephrasing your prompt.";
/// Sent on transport, timeout, or empty-response failures
pub const FAILED_REPLY: &str = "Image generation failed. Please try again later.";
/// Sent when a draw request carries neither prompt nor reference
pub const NEED_INPUT_REPLY: &str = "Give me a text prompt or a reference image to work with.";
/// Sent when a resolved reference cannot be loaded
pub const BAD_REFERENCE_REPLY: &str = "Couldn't load the reference image. Try sending it again.";

/// The image-generation bot.
///
/// One instance per process, built from config at startup and shared behind
/// an `Arc`. Handlers never fail; every outcome is an ordered list of
/// outbound messages.
pub struct ArtBot {
    config: Config,
    gallery: Gallery,
    materializer: Materializer,
    dispatcher: Dispatcher,
    sweeper: Sweeper,
}

impl std::fmt::Debug for ArtBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtBot")
            .field("model", &self.config.model)
            .field("keys", &self.dispatcher.pool().len())
            .finish()
    }
}

impl ArtBot {
    /// Build the bot and start its background sweep
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let client = GeminiClient::new(http.clone(), &config.api_base_url, &config.model);
        let pool = KeyPool::new(config.api_keys.clone(), config.random_key_selection);
        if pool.is_empty() {
            warn!("no API keys configured, generation requests will be refused");
        }

        let dispatcher = Dispatcher::new(
            client,
            pool,
            config.temp_dir.clone(),
            config.prompt_suffix.clone(),
        );
        let materializer = Materializer::new(http, config.temp_dir.clone());
        let gallery = Gallery::new(config.gallery_capacity);
        let sweeper = Sweeper::start(
            config.temp_dir.clone(),
            config.sweep_interval(),
            config.sweep_max_age(),
        );

        Ok(Self {
            config,
            gallery,
            materializer,
            dispatcher,
            sweeper,
        })
    }

    /// Create a shared instance
    pub fn shared(config: Config) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(config)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gallery of observed images, exposed for inspection
    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Record the images an inbound message carries.
    ///
    /// Skips the bot's own messages and conversations outside the whitelist.
    /// Returns how many references were recorded.
    pub async fn observe(&self, event: &ChatEvent) -> usize {
        if self.is_self(event) {
            debug!("ignoring event from the bot itself ({})", event.sender_id);
            return 0;
        }

        let conversation = event.conversation();
        if !self.config.conversation_allowed(conversation) {
            return 0;
        }

        let images = event.attached_images();
        let count = images.len();
        if count > 0 {
            self.gallery
                .record_many(&event.sender_id, conversation, images)
                .await;
            info!(
                "cached {} image(s) from {} in {}",
                count, event.sender_id, conversation
            );
        }
        count
    }

    /// Handle a draw request.
    ///
    /// Reference images attached to (or quoted by) the triggering message win;
    /// otherwise `image_index` counts back through the requester's gallery
    /// (1 = most recent, 0 = no reference). Returns the outbound messages in
    /// delivery order; suppressed requests return none.
    pub async fn draw(
        &self,
        event: &ChatEvent,
        prompt: &str,
        image_index: u32,
    ) -> Vec<OutboundMessage> {
        if self.is_self(event) {
            debug!("ignoring draw request from the bot itself");
            return Vec::new();
        }

        let conversation = event.conversation().to_string();
        if !self.config.conversation_allowed(&conversation) {
            info!("draw request from {} outside the whitelist, ignored", conversation);
            return Vec::new();
        }

        let prompt = prompt.trim();

        let refs = event.reference_images();
        let refs = if !refs.is_empty() {
            refs
        } else if image_index >= 1 {
            match self
                .gallery
                .resolve(&event.sender_id, &conversation, image_index as usize)
                .await
            {
                Some(found) => vec![found],
                None => {
                    warn!(
                        "no cached image at index {} for {} in {}",
                        image_index, event.sender_id, conversation
                    );
                    return vec![OutboundMessage::text(format!(
                        "No reference image found at index {}. Send an image first or use a valid index.",
                        image_index
                    ))];
                }
            }
        } else {
            Vec::new()
        };

        if prompt.is_empty() && refs.is_empty() {
            return vec![OutboundMessage::text(NEED_INPUT_REPLY)];
        }

        let mut references = Vec::with_capacity(refs.len());
        for image_ref in &refs {
            match self.materializer.materialize(image_ref).await {
                Ok(rgba) => references.push(rgba),
                Err(e) => {
                    warn!("cannot materialize reference {}: {}", image_ref.describe(), e);
                    return vec![OutboundMessage::text(BAD_REFERENCE_REPLY)];
                }
            }
        }

        let generation = match self.dispatcher.generate(prompt, &references).await {
            Ok(generation) => generation,
            Err(err) => return vec![OutboundMessage::text(error_reply(&err))],
        };

        // Generated files join the gallery so the next request can refer to
        // them by index and edit them further
        if !generation.images.is_empty() {
            let produced = generation
                .images
                .iter()
                .map(|path| ImageRef::file(path.clone()))
                .collect();
            self.gallery
                .record_many(&event.sender_id, &conversation, produced)
                .await;
        }

        let persona = self.persona(event);
        vec![reply::shape(
            &generation.text,
            &generation.images,
            persona.as_ref(),
        )]
    }

    /// Identity used to attribute forwarded bundles: the event's bot id when
    /// it parses as numeric, else the configured self id, else `bot_id`
    pub fn persona(&self, event: &ChatEvent) -> Option<Persona> {
        let id = event
            .self_id
            .as_deref()
            .and_then(parse_id)
            .or_else(|| self.config.self_id.as_deref().and_then(parse_id))
            .or(self.config.bot_id)?;

        Some(Persona {
            id,
            name: self.config.bot_name.clone(),
        })
    }

    /// Stop the sweeper, then clear whatever is left in the temp dir
    pub async fn shutdown(&self) {
        info!("artbot shutting down");
        self.sweeper.stop().await;

        let stats = sweep::sweep_once(&self.config.temp_dir, Duration::ZERO);
        info!(
            "final temp sweep removed {} file(s), {} error(s)",
            stats.removed, stats.errors
        );
        // Only succeeds when the directory is empty
        if let Err(e) = std::fs::remove_dir(&self.config.temp_dir) {
            debug!("temp dir left in place: {}", e);
        }
    }

    fn is_self(&self, event: &ChatEvent) -> bool {
        event.self_id.as_deref() == Some(event.sender_id.as_str())
            || self.config.self_id.as_deref() == Some(event.sender_id.as_str())
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

fn error_reply(err: &GenerateError) -> String {
    match err {
        GenerateError::NoKeys => NO_KEYS_REPLY.to_string(),
        GenerateError::SafetyBlocked(_) => SAFETY_REPLY.to_string(),
        GenerateError::EmptyResponse(_)
        | GenerateError::Transport(_)
        | GenerateError::Timeout(_) => FAILED_REPLY.to_string(),
    }
}
