//! Tree cache port and the in-memory TTL implementation.
//!
//! The cache only ever holds and hands out deep clones of the materialized
//! tree; entries are discarded wholesale on invalidation, never patched.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::tree::DirectoryTree;

/// Cache port, keyed by storage-root identity, so the in-process
/// implementation can be swapped for a distributed one without touching the
/// coordinator.
#[async_trait]
pub trait TreeCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<DirectoryTree>;
    async fn insert(&self, key: &str, tree: DirectoryTree);
    async fn invalidate(&self, key: &str);
}

/// In-memory cache with a short bounded time-to-live per entry.
pub struct MemoryTreeCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, DirectoryTree)>>,
}

impl MemoryTreeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TreeCache for MemoryTreeCache {
    async fn get(&self, key: &str) -> Option<DirectoryTree> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((stored_at, tree)) if stored_at.elapsed() < self.ttl => Some(tree.clone()),
            _ => None,
        }
    }

    async fn insert(&self, key: &str, tree: DirectoryTree) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (Instant::now(), tree));
    }

    async fn invalidate(&self, key: &str) {
        if self.entries.write().await.remove(key).is_some() {
            debug!("Invalidated tree cache entry '{key}'");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::DirectoryNode;
    use chrono::Utc;
    use uuid::Uuid;

    fn tree() -> DirectoryTree {
        DirectoryTree::new(DirectoryNode {
            id: Uuid::new_v4(),
            parent_id: None,
            name: "Root".into(),
            relative_path: String::new(),
            creation_order: 0,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn returns_clones_not_aliases() {
        let cache = MemoryTreeCache::new(Duration::from_secs(60));
        cache.insert("k", tree()).await;
        let mut first = cache.get("k").await.unwrap();
        first.root.node.name = "Mutated".into();
        let second = cache.get("k").await.unwrap();
        assert_eq!(second.root.node.name, "Root");
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = MemoryTreeCache::new(Duration::from_millis(10));
        cache.insert("k", tree()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_discards_entry() {
        let cache = MemoryTreeCache::new(Duration::from_secs(60));
        cache.insert("k", tree()).await;
        cache.invalidate("k").await;
        assert!(cache.get("k").await.is_none());
    }
}
