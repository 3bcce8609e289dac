//! Content-addressed response cache with TTL expiry.
//!
//! Generation requests are keyed by a SHA-256 fingerprint over every input
//! that affects the output: query, context, model, max tokens, temperature.
//! Entries expire lazily: `get` never returns an entry past its TTL even
//! if no sweep has run. A periodic sweep can reclaim the rest.
//!
//! Like the rest of the pipeline the cache is an owned instance, not
//! process-wide state; interior locking makes concurrent `get`/`put` safe
//! (last write wins, reads never observe a torn entry).

use crate::llm_client::Candidate;
use crate::providers::{SystemTimeProvider, TimeProvider};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Deterministic key over all generation inputs.
///
/// Equal inputs always produce equal fingerprints; SHA-256 makes collisions
/// across different inputs a non-concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint for a generation request.
///
/// Query and context are normalized (lowercased, trimmed) so trivially
/// restated queries share an entry. Context is part of the key: the same
/// query under a different context must not hit the other context's entry.
pub fn fingerprint(
    query: &str,
    context: Option<&str>,
    model: &str,
    max_tokens: u32,
    temperature: f32,
) -> Fingerprint {
    let normalized_query = query.trim().to_lowercase();
    let normalized_context = context.unwrap_or("").trim().to_lowercase();
    let key = format!(
        "{normalized_query}||{normalized_context}||{model}||{max_tokens}||{temperature:.4}"
    );

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    Fingerprint(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    candidates: Vec<Candidate>,
    created_at: u64,
    ttl_secs: u64,
}

impl CacheEntry {
    fn expired_at(&self, now: u64) -> bool {
        now > self.created_at.saturating_add(self.ttl_secs)
    }
}

/// Counters and gauges reported by [`ResponseCache::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub oldest_entry_age_secs: Option<u64>,
    /// Entries removed because their TTL elapsed (lazy or swept), reported
    /// separately from any other removal.
    pub expired_removed: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    expired_removed: u64,
}

/// Keyed store mapping request fingerprints to previously generated
/// candidates.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    path: Option<PathBuf>,
    time: Box<dyn TimeProvider>,
}

impl ResponseCache {
    /// Opens the persistent cache under the config directory.
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        let path = dir.join("response_cache.json");

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            HashMap::new()
        };

        info!("Response cache initialized at {:?} with {} entries", path, entries.len());

        Ok(Self {
            inner: Mutex::new(CacheInner {
                entries,
                ..CacheInner::default()
            }),
            path: Some(path),
            time: Box::new(SystemTimeProvider),
        })
    }

    /// Creates a purely in-memory cache (no persistence).
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            path: None,
            time: Box::new(SystemTimeProvider),
        }
    }

    /// Creates an in-memory cache with a custom time provider (for testing).
    pub fn with_time_provider(time: Box<dyn TimeProvider>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            path: None,
            time,
        }
    }

    /// Looks up candidates for a fingerprint.
    ///
    /// An entry past its TTL is removed on the spot and counted as a miss,
    /// even if no sweep ever ran.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Vec<Candidate>> {
        let now = self.time.now();
        let mut inner = self.inner.lock().unwrap();

        match inner.entries.get(&fingerprint.0) {
            Some(entry) if entry.expired_at(now) => {
                debug!("Cache entry expired for {}", fingerprint);
                inner.entries.remove(&fingerprint.0);
                inner.expired_removed += 1;
                inner.misses += 1;
                self.persist(&inner);
                None
            }
            Some(entry) => {
                debug!("Cache hit for {}", fingerprint);
                let candidates = entry.candidates.clone();
                inner.hits += 1;
                Some(candidates)
            }
            None => {
                debug!("Cache miss for {}", fingerprint);
                inner.misses += 1;
                None
            }
        }
    }

    /// Stores candidates under a fingerprint, overwriting any prior entry.
    pub fn put(&self, fingerprint: &Fingerprint, candidates: Vec<Candidate>, ttl: Duration) {
        let entry = CacheEntry {
            candidates,
            created_at: self.time.now(),
            ttl_secs: ttl.as_secs(),
        };

        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(fingerprint.0.clone(), entry);
        self.persist(&inner);
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn invalidate_expired(&self) -> usize {
        let now = self.time.now();
        let mut inner = self.inner.lock().unwrap();

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.expired_at(now));
        let removed = before - inner.entries.len();
        inner.expired_removed += removed as u64;

        if removed > 0 {
            info!("Removed {} expired cache entries", removed);
            self.persist(&inner);
        }
        removed
    }

    /// Removes every entry, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.entries.len();
        inner.entries.clear();
        self.persist(&inner);
        info!("Cleared {} cache entries", removed);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.time.now();
        let inner = self.inner.lock().unwrap();

        let oldest_entry_age_secs = inner
            .entries
            .values()
            .map(|entry| now.saturating_sub(entry.created_at))
            .max();

        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len(),
            oldest_entry_age_secs,
            expired_removed: inner.expired_removed,
        }
    }

    /// Best-effort persistence; a failed write costs a regeneration later,
    /// never the current operation.
    fn persist(&self, inner: &CacheInner) {
        let Some(path) = &self.path else {
            return;
        };
        match serde_json::to_string_pretty(&inner.entries) {
            Ok(content) => {
                if let Err(e) = fs::write(path, content) {
                    warn!("Failed to persist response cache: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize response cache: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    // Adjustable clock for expiry tests: a shared atomic acts as the time source.
    impl TimeProvider for std::sync::Arc<AtomicU64> {
        fn now(&self) -> u64 {
            self.load(Ordering::SeqCst)
        }
    }

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate {
                command: "sudo apt update".to_string(),
                description: "Refresh the package index".to_string(),
                raw_index: 0,
            },
            Candidate {
                command: "sudo apt install -y nodejs npm".to_string(),
                description: "Install Node.js and npm".to_string(),
                raw_index: 1,
            },
        ]
    }

    // =========================================================================
    // Fingerprint
    // =========================================================================

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint("install nodejs", None, "openai/gpt-4", 1000, 0.1);
        let b = fingerprint("install nodejs", None, "openai/gpt-4", 1000, 0.1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_normalizes_query_whitespace_and_case() {
        let a = fingerprint("  Install NodeJS ", None, "openai/gpt-4", 1000, 0.1);
        let b = fingerprint("install nodejs", None, "openai/gpt-4", 1000, 0.1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_varies_with_each_input() {
        let base = fingerprint("install nodejs", None, "openai/gpt-4", 1000, 0.1);
        assert_ne!(base, fingerprint("install python", None, "openai/gpt-4", 1000, 0.1));
        assert_ne!(base, fingerprint("install nodejs", Some("on ubuntu"), "openai/gpt-4", 1000, 0.1));
        assert_ne!(base, fingerprint("install nodejs", None, "anthropic/claude", 1000, 0.1));
        assert_ne!(base, fingerprint("install nodejs", None, "openai/gpt-4", 500, 0.1));
        assert_ne!(base, fingerprint("install nodejs", None, "openai/gpt-4", 1000, 0.7));
    }

    // =========================================================================
    // Get / put
    // =========================================================================

    #[test]
    fn test_put_then_get_returns_exact_candidates_and_counts_hit() {
        let cache = ResponseCache::in_memory();
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);

        cache.put(&fp, candidates(), Duration::from_secs(60));
        let got = cache.get(&fp).expect("entry should be present");

        assert_eq!(got, candidates());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_get_unknown_fingerprint_counts_miss() {
        let cache = ResponseCache::in_memory();
        let fp = fingerprint("never stored", None, "mock", 1000, 0.1);

        assert!(cache.get(&fp).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        let cache = ResponseCache::in_memory();
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);

        cache.put(&fp, candidates(), Duration::from_secs(60));
        let replacement = vec![Candidate {
            command: "apk add nodejs".to_string(),
            description: "Alpine variant".to_string(),
            raw_index: 0,
        }];
        cache.put(&fp, replacement.clone(), Duration::from_secs(60));

        assert_eq!(cache.get(&fp).unwrap(), replacement);
        assert_eq!(cache.stats().size, 1);
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    #[test]
    fn test_get_after_ttl_is_a_miss_without_any_sweep() {
        let clock = std::sync::Arc::new(AtomicU64::new(1_000));
        let cache = ResponseCache::with_time_provider(Box::new(std::sync::Arc::clone(&clock)));
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);

        cache.put(&fp, candidates(), Duration::from_secs(60));
        clock.store(1_061, Ordering::SeqCst);

        assert!(cache.get(&fp).is_none());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expired_removed, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_get_just_before_ttl_still_hits() {
        let clock = std::sync::Arc::new(AtomicU64::new(1_000));
        let cache = ResponseCache::with_time_provider(Box::new(std::sync::Arc::clone(&clock)));
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);

        cache.put(&fp, candidates(), Duration::from_secs(60));
        clock.store(1_060, Ordering::SeqCst);

        assert!(cache.get(&fp).is_some());
    }

    #[test]
    fn test_invalidate_expired_reports_count() {
        let clock = std::sync::Arc::new(AtomicU64::new(1_000));
        let cache = ResponseCache::with_time_provider(Box::new(std::sync::Arc::clone(&clock)));

        let short = fingerprint("short lived", None, "mock", 1000, 0.1);
        let long = fingerprint("long lived", None, "mock", 1000, 0.1);
        cache.put(&short, candidates(), Duration::from_secs(10));
        cache.put(&long, candidates(), Duration::from_secs(10_000));

        clock.store(1_100, Ordering::SeqCst);
        assert_eq!(cache.invalidate_expired(), 1);
        assert_eq!(cache.stats().size, 1);
        assert_eq!(cache.stats().expired_removed, 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache = ResponseCache::in_memory();
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);
        cache.put(&fp, candidates(), Duration::from_secs(60));

        assert_eq!(cache.clear(), 1);
        assert_eq!(cache.stats().size, 0);
        // Removal via clear is not an expiry.
        assert_eq!(cache.stats().expired_removed, 0);
    }

    #[test]
    fn test_oldest_entry_age_tracks_clock() {
        let clock = std::sync::Arc::new(AtomicU64::new(500));
        let cache = ResponseCache::with_time_provider(Box::new(std::sync::Arc::clone(&clock)));
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);
        cache.put(&fp, candidates(), Duration::from_secs(10_000));

        clock.store(620, Ordering::SeqCst);
        assert_eq!(cache.stats().oldest_entry_age_secs, Some(120));
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn test_persisted_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);

        {
            let cache = ResponseCache::open(dir.path().to_path_buf()).unwrap();
            cache.put(&fp, candidates(), Duration::from_secs(3600));
        }

        let reopened = ResponseCache::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.get(&fp).unwrap(), candidates());
    }

    #[test]
    fn test_corrupt_cache_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("response_cache.json"), "not json").unwrap();

        let cache = ResponseCache::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(cache.stats().size, 0);
    }

    // =========================================================================
    // Concurrency
    // =========================================================================

    #[test]
    fn test_concurrent_get_put_same_fingerprint() {
        let cache = std::sync::Arc::new(ResponseCache::in_memory());
        let fp = fingerprint("install nodejs", None, "mock", 1000, 0.1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = std::sync::Arc::clone(&cache);
            let fp = fp.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    cache.put(&fp, candidates(), Duration::from_secs(60));
                    if let Some(got) = cache.get(&fp) {
                        // A read must observe a complete entry, never a torn one.
                        assert_eq!(got.len(), 2);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.stats().size, 1);
    }
}
