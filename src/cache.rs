//! Report cache with read-time TTL expiry.
//!
//! Reports live in a document store keyed by repository. Expiry is decided when a row
//! is read: a row older than the TTL is reported as a miss but is left in the store.
//! Store failures never reach callers of [`ReportCache::get`] and [`ReportCache::put`];
//! they are logged and treated as a miss or a dropped write.

use crate::config::{AppConfig, RepoId};
use crate::error::StoreError;
use crate::metrics::MergeChanceReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// A stored report and when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Logical repository name, `owner/name`.
    pub repo: String,
    pub report: MergeChanceReport,
    pub cached_at: i64,
}

impl CacheEntry {
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() - self.cached_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: StdDuration) -> bool {
        self.age_seconds(now) < ttl.as_secs() as i64
    }
}

/// Document-style key/value store holding cache entries.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Writes `entry`, replacing any existing row for `key`.
    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), StoreError>;

    /// Up to `limit` entries, most recently written first.
    async fn recent(&self, limit: usize) -> Result<Vec<CacheEntry>, StoreError>;
}

/// In-process store. Rows are bounded by capacity only; age never evicts them.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
        }
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.get(key).await)
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CacheEntry>, StoreError> {
        let mut entries: Vec<CacheEntry> = self.entries.iter().map(|(_, entry)| entry).collect();
        entries.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

/// Outcome of a cache lookup.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(CacheEntry),
    /// No row, or the row is older than the TTL.
    Miss,
    Unavailable(StoreError),
}

#[derive(Clone)]
pub struct ReportCache {
    store: Arc<dyn ReportStore>,
    ttl: StdDuration,
}

impl ReportCache {
    pub fn new(store: Arc<dyn ReportStore>, ttl: StdDuration) -> Self {
        Self { store, ttl }
    }

    /// A cache over a fresh [`MemoryStore`] sized and timed from `config`.
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(config.cache_max_capacity)),
            config.cache_ttl(),
        )
    }

    pub async fn lookup(&self, repo: &RepoId, now: DateTime<Utc>) -> CacheLookup {
        match self.store.get(&repo.cache_key()).await {
            Ok(Some(entry)) if entry.is_fresh(now, self.ttl) => CacheLookup::Hit(entry),
            Ok(Some(entry)) => {
                tracing::debug!(repo = %repo, age = entry.age_seconds(now), "Cached report expired");
                CacheLookup::Miss
            }
            Ok(None) => CacheLookup::Miss,
            Err(e) => CacheLookup::Unavailable(e),
        }
    }

    /// Fresh entry for `repo`, if any. Store failures are logged and read as a miss.
    pub async fn get(&self, repo: &RepoId, now: DateTime<Utc>) -> Option<CacheEntry> {
        match self.lookup(repo, now).await {
            CacheLookup::Hit(entry) => Some(entry),
            CacheLookup::Miss => None,
            CacheLookup::Unavailable(e) => {
                tracing::error!(repo = %repo, "Failed to read cached report: {}", e);
                None
            }
        }
    }

    /// The stored row for `repo` whether or not it has expired.
    pub async fn peek(&self, repo: &RepoId) -> Result<Option<CacheEntry>, StoreError> {
        self.store.get(&repo.cache_key()).await
    }

    /// Stores `report` for `repo`, overwriting any previous row. Failures are logged
    /// and the write is dropped.
    pub async fn put(&self, repo: &RepoId, report: MergeChanceReport, now: DateTime<Utc>) {
        let entry = CacheEntry {
            repo: repo.to_string(),
            report,
            cached_at: now.timestamp(),
        };
        if let Err(e) = self.store.put(&repo.cache_key(), entry).await {
            tracing::error!(repo = %repo, "Failed to cache report: {}", e);
        }
    }

    /// Names of the most recently computed repositories.
    pub async fn recent_repos(&self, limit: usize) -> Vec<String> {
        match self.store.recent(limit).await {
            Ok(entries) => entries.into_iter().map(|entry| entry.repo).collect(),
            Err(e) => {
                tracing::error!("Failed to list recent reports: {}", e);
                Vec::new()
            }
        }
    }
}
