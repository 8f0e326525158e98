//! Per-worker-process module cache (§4.6 expansion): a `DashMap` keyed by
//! `(repo, commit, file)` holding fetched workflow source, with a
//! byte-size soft cap tracked by an `AtomicUsize`. Safe to evict at any
//! time (§5) — eviction here is arbitrary-entry, not LRU, since no
//! ordering guarantee is required. Bounded rather than an unbounded
//! in-process dict, per DESIGN.md.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::errors::EngineError;

type CacheKey = (String, String, String);

pub struct ModuleCache {
    entries: DashMap<CacheKey, Arc<Vec<u8>>>,
    used_bytes: AtomicUsize,
    cap_bytes: usize,
}

impl ModuleCache {
    pub fn new(cap_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            cap_bytes,
        }
    }

    /// Return the cached source for `(repo, commit, file)`, or call `fetch`
    /// and insert the result.
    pub async fn get_or_fetch<F, Fut>(&self, repo: &str, commit: &str, file: &str, fetch: F) -> Result<Arc<Vec<u8>>, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, EngineError>>,
    {
        let key: CacheKey = (repo.to_string(), commit.to_string(), file.to_string());
        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.clone());
        }
        let bytes = fetch().await?;
        let arc = Arc::new(bytes);
        self.insert(key, arc.clone());
        Ok(arc)
    }

    fn insert(&self, key: CacheKey, value: Arc<Vec<u8>>) {
        let size = value.len();
        if self.used_bytes.load(Ordering::Relaxed) + size > self.cap_bytes {
            self.evict_until_room(size);
        }
        self.entries.insert(key, value);
        self.used_bytes.fetch_add(size, Ordering::Relaxed);
    }

    fn evict_until_room(&self, needed: usize) {
        // Arbitrary-entry eviction (§5: "safe to evict at any time").
        let mut freed = 0;
        let victims: Vec<CacheKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        for key in victims {
            if self.used_bytes.load(Ordering::Relaxed) + needed <= self.cap_bytes + freed {
                break;
            }
            if let Some((_, value)) = self.entries.remove(&key) {
                freed += value.len();
                self.used_bytes.fetch_sub(value.len(), Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_fetch_caches_on_first_miss() {
        let cache = ModuleCache::new(1024);
        let mut calls = 0;
        let first = cache
            .get_or_fetch("repo", "C", "w.py", || {
                calls += 1;
                async { Ok(b"source".to_vec()) }
            })
            .await
            .unwrap();
        assert_eq!(*first, b"source".to_vec());

        let second = cache.get_or_fetch("repo", "C", "w.py", || async { Ok(b"different".to_vec()) }).await.unwrap();
        assert_eq!(*second, b"source".to_vec());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn eviction_keeps_cache_under_cap() {
        let cache = ModuleCache::new(10);
        for i in 0..5 {
            let file = format!("f{i}.py");
            cache.get_or_fetch("repo", "C", &file, || async { Ok(vec![0u8; 4]) }).await.unwrap();
        }
        assert!(cache.used_bytes.load(Ordering::Relaxed) <= 10 + 4);
    }
}
