//! Image references and materialization
//!
//! Provides:
//! - ImageRef: tagged reference to a remote, on-disk, or inline image
//! - Materializer: resolve a reference into a decoded RGBA image
//! - PNG encode/save helpers shared with the generation pipeline

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

/// Where the bytes of a referenced image live.
///
/// The variant is fixed when the reference is constructed; nothing downstream
/// re-inspects the payload to guess what it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// Remote image, fetched lazily on materialization
    Url { url: String },
    /// Image already on disk (e.g. a previously generated output)
    File { path: PathBuf },
    /// Base64 payload carried inside the event
    Inline { data: String, mime: String },
}

/// A reference to an image observed in chat or produced by generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(flatten)]
    pub source: ImageSource,
    /// Original filename or synthetic description, for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ImageRef {
    /// Reference a remote image by URL
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source: ImageSource::Url { url: url.into() },
            label: None,
        }
    }

    /// Reference an image file on disk
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ImageSource::File { path: path.into() },
            label: None,
        }
    }

    /// Reference an inline base64 payload
    pub fn inline(data: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            source: ImageSource::Inline {
                data: data.into(),
                mime: mime.into(),
            },
            label: None,
        }
    }

    /// Attach a diagnostic label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Short description for log lines
    pub fn describe(&self) -> String {
        if let Some(ref label) = self.label {
            return label.clone();
        }
        match &self.source {
            ImageSource::Url { url } => format!("url:{}", url),
            ImageSource::File { path } => format!("file:{}", path.display()),
            ImageSource::Inline { mime, data } => {
                format!("inline:{} ({} bytes b64)", mime, data.len())
            }
        }
    }
}

/// Why a reference could not be turned into a usable image
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

/// Resolves image references into decoded, RGBA-normalized images
#[derive(Debug, Clone)]
pub struct Materializer {
    http: reqwest::Client,
    temp_dir: PathBuf,
}

impl Materializer {
    /// Create a materializer sharing the process HTTP client
    pub fn new(http: reqwest::Client, temp_dir: PathBuf) -> Self {
        Self { http, temp_dir }
    }

    /// Resolve a reference into a decoded RGBA image.
    ///
    /// Remote references are fetched over HTTP once; the bytes are kept in the
    /// temp dir under a URL-hash name and later materializations of the same
    /// URL read that copy instead of refetching, until the sweep removes it.
    pub async fn materialize(&self, image: &ImageRef) -> Result<RgbaImage, MaterializeError> {
        match &image.source {
            ImageSource::Url { url } => self.fetch_remote(url).await,
            ImageSource::File { path } => {
                let bytes = tokio::fs::read(path).await?;
                decode_rgba(&bytes)
            }
            ImageSource::Inline { data, .. } => {
                let bytes = BASE64.decode(data.as_bytes())?;
                decode_rgba(&bytes)
            }
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<RgbaImage, MaterializeError> {
        let cached = self
            .temp_dir
            .join(format!("ref_{}.img", sha256_hex(url.as_bytes())));

        // An earlier materialization of this URL may still be on disk
        if let Ok(bytes) = tokio::fs::read(&cached).await {
            match decode_rgba(&bytes) {
                Ok(img) => {
                    debug!("reusing fetched copy of {} at {}", url, cached.display());
                    return Ok(img);
                }
                Err(e) => {
                    debug!("unreadable copy at {} ({}), refetching", cached.display(), e);
                    let _ = tokio::fs::remove_file(&cached).await;
                }
            }
        }

        debug!("fetching reference image from {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| MaterializeError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MaterializeError::Fetch(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MaterializeError::Fetch(e.to_string()))?;

        if let Err(e) = tokio::fs::write(&cached, &bytes).await {
            warn!("failed to keep fetched image at {}: {}", cached.display(), e);
        }

        match decode_rgba(&bytes) {
            Ok(img) => Ok(img),
            Err(e) => {
                // A copy of an undecodable download is useless; drop it.
                let _ = tokio::fs::remove_file(&cached).await;
                Err(e)
            }
        }
    }
}

/// Decode arbitrary image bytes and normalize to RGBA8
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, MaterializeError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(decoded.to_rgba8())
}

/// Encode an RGBA image as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, MaterializeError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Write an RGBA image to disk as a PNG
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), MaterializeError> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// SHA-256 hex digest, for stable cache file names
fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
