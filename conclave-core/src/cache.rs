//! Review result cache
//!
//! Completed reviews are cached keyed by a fingerprint of the reviewed
//! content, the review configuration, and the model id. A hit returns the
//! stored result without invoking the agent; a miss falls through to a
//! fresh review whose result is stored afterwards. Cache failures never
//! fail a review.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::review::{ReviewJob, ReviewResult};
use crate::Result;

/// Bumped whenever the stored entry layout changes
const CACHE_FORMAT_VERSION: u32 = 1;

/// Content-addressed cache key.
///
/// Two jobs share a key exactly when they review identical content with
/// the same phases, extra instructions, diff base, and model. The file
/// path and correlation id are deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_job(job: &ReviewJob, content: &str, model: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
        for phase in &job.phases {
            hasher.update(phase.as_str().as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0u8]);
        if let Some(ref instructions) = job.extra_instructions {
            hasher.update(instructions.as_bytes());
        }
        hasher.update([0u8]);
        if let Some(ref base) = job.diff_base {
            hasher.update(base.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(model.as_bytes());

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            hex.push_str(&format!("{:02x}", byte));
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage backend for cached review results
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<ReviewResult>>;

    async fn put(&self, key: &CacheKey, result: &ReviewResult) -> Result<()>;

    /// Drop every stored entry; returns how many were removed
    async fn clear(&self) -> Result<usize>;
}

/// In-memory store; the default for tests and single-shot runs
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, ReviewResult>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<ReviewResult>> {
        Ok(self
            .entries
            .lock()
            .ok()
            .and_then(|map| map.get(key.as_str()).cloned()))
    }

    async fn put(&self, key: &CacheKey, result: &ReviewResult) -> Result<()> {
        if let Ok(mut map) = self.entries.lock() {
            map.insert(key.as_str().to_string(), result.clone());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        match self.entries.lock() {
            Ok(mut map) => {
                let removed = map.len();
                map.clear();
                Ok(removed)
            }
            Err(_) => Ok(0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    version: u32,
    key: String,
    cached_at: DateTime<Utc>,
    result: ReviewResult,
}

/// JSON-file store under a cache directory.
///
/// Entries live at `<root>/<first two hex chars>/<key>.json` and are
/// written through a temp file plus rename so readers never see a partial
/// entry. Entries with a stale format version or a mismatched key are
/// treated as misses.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at `.conclave/cache` under the given project directory
    pub fn for_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join(".conclave").join("cache"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(&key.as_str()[..2])
            .join(format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<ReviewResult>> {
        let path = self.entry_path(key);
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<StoredEntry>(&body) {
            Ok(entry) if entry.version == CACHE_FORMAT_VERSION && entry.key == key.as_str() => {
                Ok(Some(entry.result))
            }
            Ok(_) => {
                tracing::debug!(path = %path.display(), "ignoring stale cache entry");
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, result: &ReviewResult) -> Result<()> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entry = StoredEntry {
            version: CACHE_FORMAT_VERSION,
            key: key.as_str().to_string(),
            cached_at: Utc::now(),
            result: result.clone(),
        };
        let body = serde_json::to_string_pretty(&entry)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut subdirs = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(subdir) = subdirs.next_entry().await? {
            let mut entries = tokio::fs::read_dir(subdir.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.path().extension().is_some_and(|ext| ext == "json") {
                    removed += 1;
                }
            }
            tokio::fs::remove_dir_all(subdir.path()).await?;
        }
        Ok(removed)
    }
}

/// Front door the job driver talks to.
///
/// Wraps a store with the enable flag and swallows storage failures: a
/// broken cache degrades to always-miss, it never fails a review.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
    enabled: bool,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn CacheStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Gateway that never hits and never stores
    pub fn disabled() -> Self {
        Self {
            store: Arc::new(MemoryCache::new()),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn get(&self, key: &CacheKey) -> Option<ReviewResult> {
        if !self.enabled {
            return None;
        }
        match self.store.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn put(&self, key: &CacheKey, result: &ReviewResult) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.store.put(key, result).await {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }

    /// Clears the underlying store even when caching is disabled
    pub async fn clear(&self) -> Result<usize> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::ReviewPhase;

    fn result(summary: &str) -> ReviewResult {
        ReviewResult::clean(summary)
    }

    #[test]
    fn test_key_depends_on_content_and_config() {
        let job = ReviewJob::new("src/a.rs");
        let base = CacheKey::for_job(&job, "fn a() {}", "model-1");

        assert_eq!(base, CacheKey::for_job(&ReviewJob::new("src/b.rs"), "fn a() {}", "model-1"));
        assert_ne!(base, CacheKey::for_job(&job, "fn b() {}", "model-1"));
        assert_ne!(base, CacheKey::for_job(&job, "fn a() {}", "model-2"));

        let phased = ReviewJob::new("src/a.rs").with_phases(vec![ReviewPhase::Security]);
        assert_ne!(base, CacheKey::for_job(&phased, "fn a() {}", "model-1"));

        let instructed = ReviewJob::new("src/a.rs").with_extra_instructions("check auth");
        assert_ne!(base, CacheKey::for_job(&instructed, "fn a() {}", "model-1"));

        let diffed = ReviewJob::new("src/a.rs").with_diff_base("main");
        assert_ne!(base, CacheKey::for_job(&diffed, "fn a() {}", "model-1"));
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let key = CacheKey::for_job(&ReviewJob::new("x"), "content", "m");
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        let key = CacheKey::for_job(&ReviewJob::new("x"), "content", "m");

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.put(&key, &result("cached")).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().unwrap().summary, "cached");

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::for_job(&ReviewJob::new("x"), "content", "m");

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.put(&key, &result("stored")).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().unwrap().summary, "stored");
    }

    #[tokio::test]
    async fn test_file_cache_ignores_corrupt_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::for_job(&ReviewJob::new("x"), "content", "m");

        let path = cache.entry_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_ignores_stale_version() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::for_job(&ReviewJob::new("x"), "content", "m");

        let entry = serde_json::json!({
            "version": 0,
            "key": key.as_str(),
            "cached_at": Utc::now(),
            "result": result("old"),
        });
        let path = cache.entry_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, entry.to_string()).unwrap();

        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_clear_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        for i in 0..3 {
            let key = CacheKey::for_job(&ReviewJob::new("x"), &format!("content {}", i), "m");
            cache.put(&key, &result("r")).await.unwrap();
        }

        assert_eq!(cache.clear().await.unwrap(), 3);
        assert_eq!(cache.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_gateway_never_hits_or_stores() {
        let store = Arc::new(MemoryCache::new());
        let gateway = CacheGateway::new(Arc::clone(&store) as Arc<dyn CacheStore>, false);
        let key = CacheKey::for_job(&ReviewJob::new("x"), "content", "m");

        gateway.put(&key, &result("r")).await;
        assert!(gateway.get(&key).await.is_none());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enabled_gateway_roundtrip() {
        let gateway = CacheGateway::new(Arc::new(MemoryCache::new()), true);
        let key = CacheKey::for_job(&ReviewJob::new("x"), "content", "m");

        gateway.put(&key, &result("hit")).await;
        assert_eq!(gateway.get(&key).await.unwrap().summary, "hit");
    }
}
