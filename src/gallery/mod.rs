//! Per-user gallery of recently seen images
//!
//! Provides:
//! - Bounded, insertion-ordered image-reference history per (user, conversation)
//! - Nth-from-latest lookup for "use my last image" requests

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::images::ImageRef;

/// Identity a history is partitioned by: (user id, conversation id)
type GalleryKey = (String, String);

/// Bounded history of recently seen images per (user, conversation)
#[derive(Debug)]
pub struct Gallery {
    /// Keyed histories; newest entry at the back
    entries: RwLock<HashMap<GalleryKey, VecDeque<ImageRef>>>,
    /// References retained per key
    capacity: usize,
}

impl Gallery {
    /// Create a gallery retaining up to `capacity` references per key
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Create a shared instance
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// References retained per key
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record one observed reference for a key.
    ///
    /// Creates the history on first use and evicts the oldest entry once the
    /// capacity would be exceeded. Always succeeds.
    pub async fn record(&self, user_id: &str, conversation_id: &str, image: ImageRef) {
        let mut entries = self.entries.write().await;
        let history = entries
            .entry((user_id.to_string(), conversation_id.to_string()))
            .or_default();

        debug!(
            "recording image for {} in {}: {}",
            user_id,
            conversation_id,
            image.describe()
        );
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(image);
    }

    /// Record several references under one lock, preserving the order they
    /// appeared in within the originating message.
    pub async fn record_many(&self, user_id: &str, conversation_id: &str, images: Vec<ImageRef>) {
        if images.is_empty() {
            return;
        }

        let mut entries = self.entries.write().await;
        let history = entries
            .entry((user_id.to_string(), conversation_id.to_string()))
            .or_default();

        for image in images {
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(image);
        }
    }

    /// Look up the Nth-from-latest reference for a key (1 = most recent).
    ///
    /// Returns `None` when the key is unknown, the history is empty, or the
    /// index falls outside `[1, len]`. Never mutates.
    pub async fn resolve(
        &self,
        user_id: &str,
        conversation_id: &str,
        index: usize,
    ) -> Option<ImageRef> {
        let entries = self.entries.read().await;
        let key = (user_id.to_string(), conversation_id.to_string());
        let history = entries.get(&key)?;

        if index == 0 || index > history.len() {
            return None;
        }
        history.get(history.len() - index).cloned()
    }

    /// Number of references currently held for a key
    pub async fn len(&self, user_id: &str, conversation_id: &str) -> usize {
        let entries = self.entries.read().await;
        let key = (user_id.to_string(), conversation_id.to_string());
        entries.get(&key).map(VecDeque::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(u: &str) -> ImageRef {
        ImageRef::url(u)
    }

    #[tokio::test]
    async fn test_record_and_resolve_latest() {
        let gallery = Gallery::new(5);
        gallery.record("u1", "c1", url("a")).await;
        gallery.record("u1", "c1", url("b")).await;

        assert_eq!(gallery.resolve("u1", "c1", 1).await, Some(url("b")));
        assert_eq!(gallery.resolve("u1", "c1", 2).await, Some(url("a")));
        assert_eq!(gallery.len("u1", "c1").await, 2);
    }

    #[tokio::test]
    async fn test_eviction_at_capacity() {
        let gallery = Gallery::new(3);
        for u in ["a", "b", "c"] {
            gallery.record("u1", "c1", url(u)).await;
        }
        gallery.record("u1", "c1", url("d")).await;

        // Oldest evicted: history is now [b, c, d]
        assert_eq!(gallery.len("u1", "c1").await, 3);
        assert_eq!(gallery.resolve("u1", "c1", 1).await, Some(url("d")));
        assert_eq!(gallery.resolve("u1", "c1", 3).await, Some(url("b")));
        assert_eq!(gallery.resolve("u1", "c1", 4).await, None);
    }

    #[tokio::test]
    async fn test_length_never_exceeds_capacity() {
        let gallery = Gallery::new(4);
        for i in 0..20 {
            gallery.record("u1", "c1", url(&format!("img{}", i))).await;
            assert!(gallery.len("u1", "c1").await <= 4);
            assert_eq!(
                gallery.resolve("u1", "c1", 1).await,
                Some(url(&format!("img{}", i)))
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_out_of_range_is_none() {
        let gallery = Gallery::new(3);
        assert_eq!(gallery.resolve("u1", "c1", 1).await, None);

        gallery.record("u1", "c1", url("a")).await;
        assert_eq!(gallery.resolve("u1", "c1", 0).await, None);
        assert_eq!(gallery.resolve("u1", "c1", 2).await, None);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let gallery = Gallery::new(3);
        gallery.record("u1", "c1", url("group")).await;
        gallery.record("u1", "u1", url("direct")).await;

        assert_eq!(gallery.resolve("u1", "c1", 1).await, Some(url("group")));
        assert_eq!(gallery.resolve("u1", "u1", 1).await, Some(url("direct")));
        assert_eq!(gallery.resolve("u2", "c1", 1).await, None);
    }

    #[tokio::test]
    async fn test_record_many_preserves_message_order() {
        let gallery = Gallery::new(5);
        gallery
            .record_many("u1", "c1", vec![url("first"), url("second"), url("third")])
            .await;

        assert_eq!(gallery.resolve("u1", "c1", 3).await, Some(url("first")));
        assert_eq!(gallery.resolve("u1", "c1", 1).await, Some(url("third")));
    }

    #[tokio::test]
    async fn test_record_many_evicts_past_capacity() {
        let gallery = Gallery::new(2);
        gallery
            .record_many("u1", "c1", vec![url("a"), url("b"), url("c")])
            .await;

        assert_eq!(gallery.len("u1", "c1").await, 2);
        assert_eq!(gallery.resolve("u1", "c1", 1).await, Some(url("c")));
        assert_eq!(gallery.resolve("u1", "c1", 2).await, Some(url("b")));
    }

    #[test]
    fn test_capacity_floor_of_one() {
        let gallery = Gallery::new(0);
        assert_eq!(gallery.capacity(), 1);
    }
}
