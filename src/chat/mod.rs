//! Host chat boundary types
//!
//! Provides:
//! - Inbound chat events as the host adapter hands them over
//! - Outbound message shapes (plain text, chain, forwarded bundle)
//! - Response shaping from generation results

pub mod reply;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::images::ImageRef;

/// One inbound chat event from the host framework.
///
/// The adapter resolves platform attachments into `ImageRef`s before handing
/// the event over; nothing here re-inspects raw platform payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Sending user id
    pub sender_id: String,
    /// Group / channel id; absent in direct chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// The bot account id the event arrived on, when the host knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_id: Option<String>,
    /// Ordered message segments
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl ChatEvent {
    /// Event with no segments, for building up in adapters and tests
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            conversation_id: None,
            self_id: None,
            segments: Vec::new(),
        }
    }

    /// Set the conversation id
    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Set the receiving bot id
    pub fn with_self_id(mut self, self_id: impl Into<String>) -> Self {
        self.self_id = Some(self_id.into());
        self
    }

    /// Append a segment
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Conversation scope for history keying; direct chats fall back to the
    /// sender id so each private chat gets its own history
    pub fn conversation(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(&self.sender_id)
    }

    /// Images attached directly to this message, in segment order
    pub fn attached_images(&self) -> Vec<ImageRef> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Image { image } => Some(image.clone()),
                _ => None,
            })
            .collect()
    }

    /// Reference images for generation: direct attachments first, then any
    /// images carried by a quoted message
    pub fn reference_images(&self) -> Vec<ImageRef> {
        let mut refs = self.attached_images();
        for segment in &self.segments {
            if let Segment::Reply { images } = segment {
                refs.extend(images.iter().cloned());
            }
        }
        refs
    }
}

/// One segment of an inbound message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text
    Text { text: String },
    /// An attached image, already resolved to a reference
    Image { image: ImageRef },
    /// A quoted message, reduced to the images it carried
    Reply { images: Vec<ImageRef> },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text { text: text.into() }
    }

    pub fn image(image: ImageRef) -> Self {
        Segment::Image { image }
    }
}

/// Identity a forwarded bundle is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: u64,
    pub name: String,
}

/// One outbound message for the host to deliver. Handlers return these in
/// delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Plain text message
    Text { text: String },
    /// Single message assembled from parts
    Chain { parts: Vec<ChainPart> },
    /// Forwarded bundle of nodes, each attributed to the persona
    Forward {
        persona_id: u64,
        persona_name: String,
        nodes: Vec<ForwardNode>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundMessage::Text { text: text.into() }
    }
}

/// One part of a chain or forward node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainPart {
    Text { text: String },
    Image { path: PathBuf },
}

/// One message inside a forwarded bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardNode {
    pub parts: Vec<ChainPart>,
}
