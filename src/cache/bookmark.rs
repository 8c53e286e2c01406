//! Bookmark lists cached per user.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    task::JoinHandle,
    time::{interval, Instant},
};

use crate::{config::BookmarkConfig, models::bookmark::Bookmark};

#[derive(Debug, Clone)]
struct Entry {
    bookmarks: Vec<Bookmark>,
    expires: Instant,
}

/// Per-user bookmark lists with a fixed lifetime.
///
/// Expired entries are never returned and are swept out periodically by a
/// background task that stops when the cache is dropped.
#[derive(Debug)]
pub struct BookmarkCache {
    entries: Arc<DashMap<String, Entry>>,
    ttl: Duration,
    sweeper: JoinHandle<()>,
}

impl BookmarkCache {
    /// Creates a cache whose entries live for `ttl`, swept every `sweep`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(ttl: Duration, sweep: Duration) -> Self {
        let entries: Arc<DashMap<String, Entry>> = Arc::new(DashMap::new());
        let clone = entries.clone();

        let sweeper = tokio::spawn(async move {
            let mut interval = interval(sweep);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = Instant::now();
                let before = clone.len();
                clone.retain(|_, entry| entry.expires > now);
                let swept = before.saturating_sub(clone.len());
                if swept > 0 {
                    log::debug!("swept {swept} expired bookmark lists");
                }
            }
        });

        BookmarkCache {
            entries,
            ttl,
            sweeper,
        }
    }

    /// Creates a cache from the `[bookmarks]` config section.
    pub fn from_config(config: &BookmarkConfig) -> Self {
        Self::new(config.ttl(), config.sweep())
    }

    /// Returns `username`'s bookmarks unless missing or expired.
    pub fn get(&self, username: &str) -> Option<Vec<Bookmark>> {
        let found = self
            .entries
            .get(username)
            .filter(|e| e.expires > Instant::now())
            .map(|e| e.bookmarks.clone());
        match &found {
            Some(_) => log::debug!("bookmark cache hit for {username}"),
            None => log::debug!("bookmark cache miss for {username}"),
        }
        found
    }

    /// Replaces `username`'s bookmarks and restarts their lifetime.
    pub fn set(&self, username: &str, bookmarks: Vec<Bookmark>) {
        log::debug!("caching {} bookmarks for {username}", bookmarks.len());
        self.entries.insert(
            username.to_string(),
            Entry {
                bookmarks,
                expires: Instant::now() + self.ttl,
            },
        );
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for BookmarkCache {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks() -> Vec<Bookmark> {
        vec![Bookmark::new("LUE", "LUE"), Bookmark::new("Anon", "LUE-Anonymous")]
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = BookmarkCache::new(Duration::from_secs(60), Duration::from_secs(60));
        assert!(cache.get("alice").is_none());
        cache.set("alice", marks());
        assert_eq!(cache.get("alice"), Some(marks()));
        assert!(cache.get("bob").is_none());
    }

    #[tokio::test]
    async fn entries_expire_and_get_swept() {
        let cache = BookmarkCache::new(Duration::from_millis(20), Duration::from_millis(10));
        cache.set("alice", marks());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get("alice").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn set_refreshes_lifetime() {
        let cache = BookmarkCache::new(Duration::from_millis(60), Duration::from_secs(60));
        cache.set("alice", marks());
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.set("alice", vec![Bookmark::new("LUE", "LUE")]);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("alice").unwrap().len(), 1);
    }
}
