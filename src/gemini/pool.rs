//! API key rotation
//!
//! Provides:
//! - Ordered credential set with a persistent round-robin cursor
//! - Per-call attempt plans covering every key exactly once

use parking_lot::Mutex;
use rand::seq::SliceRandom;

/// Rotating set of API keys.
///
/// `plan()` yields the order to try keys in for one generation call; the
/// cursor only moves via `advance()` after a success, so failed calls leave
/// the rotation where it was.
#[derive(Debug)]
pub struct KeyPool {
    /// Keys in configuration order
    keys: Vec<String>,
    /// Index the next round-robin plan starts from
    cursor: Mutex<usize>,
    /// Shuffle each plan instead of rotating from the cursor
    random: bool,
}

impl KeyPool {
    /// Create a pool over the given keys
    pub fn new(keys: Vec<String>, random: bool) -> Self {
        Self {
            keys,
            cursor: Mutex::new(0),
            random,
        }
    }

    /// Number of keys in the pool
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no keys are configured
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key at a plan index
    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        *self.cursor.lock()
    }

    /// Build the attempt order for one call: every key index exactly once,
    /// shuffled in random mode, otherwise rotating from the cursor.
    pub fn plan(&self) -> Vec<usize> {
        let len = self.keys.len();
        if len == 0 {
            return Vec::new();
        }

        if self.random {
            let mut indices: Vec<usize> = (0..len).collect();
            indices.shuffle(&mut rand::rng());
            indices
        } else {
            let cursor = *self.cursor.lock();
            (0..len).map(|i| (cursor + i) % len).collect()
        }
    }

    /// Move the cursor past a key that just succeeded. No-op in random mode;
    /// failures never call this, so they leave the cursor unchanged.
    pub fn advance(&self, succeeded: usize) {
        if self.random || self.keys.is_empty() {
            return;
        }
        let mut cursor = self.cursor.lock();
        *cursor = (succeeded + 1) % self.keys.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key{}", i)).collect()
    }

    #[test]
    fn test_round_robin_plan_rotates_from_cursor() {
        let pool = KeyPool::new(keys(3), false);
        assert_eq!(pool.plan(), vec![0, 1, 2]);

        pool.advance(0);
        assert_eq!(pool.plan(), vec![1, 2, 0]);

        pool.advance(2);
        assert_eq!(pool.plan(), vec![0, 1, 2]);
    }

    #[test]
    fn test_successes_cover_all_keys_before_repeat() {
        let pool = KeyPool::new(keys(4), false);

        // Each call succeeds on its first planned key
        let mut used = Vec::new();
        for _ in 0..4 {
            let first = pool.plan()[0];
            used.push(first);
            pool.advance(first);
        }

        let mut sorted = used.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        // And the fifth call starts the cycle over
        assert_eq!(pool.plan()[0], used[0]);
    }

    #[test]
    fn test_plan_without_advance_leaves_cursor_alone() {
        let pool = KeyPool::new(keys(3), false);
        for _ in 0..5 {
            assert_eq!(pool.plan(), vec![0, 1, 2]);
        }
        assert_eq!(pool.cursor(), 0);
    }

    #[test]
    fn test_random_plan_is_full_permutation() {
        let pool = KeyPool::new(keys(8), true);
        let mut plan = pool.plan();
        plan.sort_unstable();
        assert_eq!(plan, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_random_mode_never_moves_cursor() {
        let pool = KeyPool::new(keys(3), true);
        pool.advance(1);
        pool.advance(2);
        assert_eq!(pool.cursor(), 0);
    }

    #[test]
    fn test_empty_pool_plans_nothing() {
        let pool = KeyPool::new(Vec::new(), false);
        assert!(pool.is_empty());
        assert!(pool.plan().is_empty());
        pool.advance(0);
        assert_eq!(pool.cursor(), 0);
    }

    #[test]
    fn test_key_lookup() {
        let pool = KeyPool::new(keys(2), false);
        assert_eq!(pool.key(1), Some("key1"));
        assert_eq!(pool.key(2), None);
    }
}
