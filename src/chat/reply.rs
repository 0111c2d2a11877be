//! Response shaping
//!
//! Provides:
//! - Chain replies for zero-or-one-image results
//! - Forwarded bundles for multi-image results, with paragraph interleaving

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{ChainPart, ForwardNode, OutboundMessage, Persona};

/// Sent when a reply ends up with nothing deliverable in it
pub const NO_CONTENT_REPLY: &str = "Sorry, nothing usable came back from the model.";

/// Shape a generation result into one outbound message.
///
/// The text is trimmed before delivery. Zero or one image files make a chain;
/// two or more make a forwarded bundle attributed to `persona`. Without a
/// persona the bundle degrades to a flat chain. Files that vanished or are
/// empty on disk are dropped at inclusion time. Never fails; a reply with
/// nothing left in it becomes the no-content text fallback.
pub fn shape(text: &str, image_files: &[PathBuf], persona: Option<&Persona>) -> OutboundMessage {
    let text = text.trim();
    if image_files.len() < 2 {
        return chain(text, image_files);
    }

    match persona {
        Some(persona) => forward(text, image_files, persona),
        None => {
            debug!("no persona for a multi-image reply, sending a flat chain");
            chain(text, image_files)
        }
    }
}

/// Single message: text first, then every deliverable image
fn chain(text: &str, image_files: &[PathBuf]) -> OutboundMessage {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(ChainPart::Text {
            text: text.to_string(),
        });
    }

    for path in image_files {
        if deliverable(path) {
            parts.push(ChainPart::Image { path: path.clone() });
        } else {
            warn!("dropping missing or empty image from reply: {}", path.display());
        }
    }

    if parts.is_empty() {
        return OutboundMessage::text(NO_CONTENT_REPLY);
    }
    OutboundMessage::Chain { parts }
}

/// Forwarded bundle: paragraphs pair up with images one-to-one when the
/// counts match, otherwise all paragraphs come first and images follow
fn forward(text: &str, image_files: &[PathBuf], persona: &Persona) -> OutboundMessage {
    let paragraphs = split_paragraphs(text);
    let mut nodes = Vec::new();

    if !paragraphs.is_empty() && paragraphs.len() == image_files.len() {
        for (paragraph, path) in paragraphs.iter().zip(image_files) {
            let mut parts = vec![ChainPart::Text {
                text: paragraph.clone(),
            }];
            if deliverable(path) {
                parts.push(ChainPart::Image { path: path.clone() });
            } else {
                warn!("dropping missing or empty image from bundle: {}", path.display());
            }
            nodes.push(ForwardNode { parts });
        }
    } else {
        for paragraph in &paragraphs {
            nodes.push(ForwardNode {
                parts: vec![ChainPart::Text {
                    text: paragraph.clone(),
                }],
            });
        }
        for path in image_files {
            if deliverable(path) {
                nodes.push(ForwardNode {
                    parts: vec![ChainPart::Image { path: path.clone() }],
                });
            } else {
                warn!("dropping missing or empty image from bundle: {}", path.display());
            }
        }
    }

    if nodes.is_empty() {
        return OutboundMessage::text(NO_CONTENT_REPLY);
    }

    OutboundMessage::Forward {
        persona_id: persona.id,
        persona_name: persona.name.clone(),
        nodes,
    }
}

/// Blank-line paragraphs, trimmed, empties removed
fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// A file is deliverable when it still exists and is non-empty
fn deliverable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
