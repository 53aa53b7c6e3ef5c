//! Content-addressed, LRU-over-byte-budget cache of chunking results.
//!
//! Keys never include the file path: only the file's content hash and the
//! canonicalised chunking options. Sharded with `dashmap` for low
//! contention, with an in-flight-build map so concurrent callers racing on
//! the same key coalesce onto a single build instead of duplicating work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Notify;

use crate::data::{Chunk, ChunkingOptions};
use crate::error::{PipelineError, PipelineResult};

/// Digest over `(sha256(file_bytes), canonicalised(options))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(file_bytes: &[u8], options: &ChunkingOptions) -> PipelineResult<Self> {
        let mut hasher = Sha256::new();
        hasher.update(file_bytes);
        let content_hash = hasher.finalize();

        let canonical_options = canonicalize_options(options)?;

        let mut combined = Sha256::new();
        combined.update(content_hash);
        combined.update(canonical_options.as_bytes());
        Ok(Self(format!("{:x}", combined.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `serde_json` preserves struct field order, not a canonical
/// lexicographic order; round-trip through a `BTreeMap` first so two
/// semantically-equal options always hash identically regardless of how
/// the caller populated `custom`.
fn canonicalize_options(options: &ChunkingOptions) -> PipelineResult<String> {
    let value = serde_json::to_value(options)?;
    let canonical: std::collections::BTreeMap<String, serde_json::Value> =
        serde_json::from_value(value).unwrap_or_default();
    Ok(serde_json::to_string(&canonical)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub chunks: Vec<Chunk>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_accessed: chrono::DateTime<chrono::Utc>,
    pub size_hint: usize,
}

impl CacheEntry {
    fn new(chunks: Vec<Chunk>) -> Self {
        let size_hint = chunks.iter().map(|c| c.content.len()).sum();
        let now = chrono::Utc::now();
        Self {
            chunks,
            created_at: now,
            last_accessed: now,
            size_hint,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct DiskKeyFile {
    sha256: String,
    options: serde_json::Value,
    last_accessed: chrono::DateTime<chrono::Utc>,
}

struct Shard {
    entries: DashMap<CacheKey, CacheEntry>,
    order: std::sync::Mutex<Vec<CacheKey>>,
}

impl Default for Shard {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            order: std::sync::Mutex::new(Vec::new()),
        }
    }
}

const SHARD_COUNT: usize = 16;

/// Content-addressed cache: sharded, thread-safe, LRU over a byte budget.
pub struct ResultCache {
    shards: Vec<Shard>,
    budget_bytes: usize,
    used_bytes: std::sync::atomic::AtomicUsize,
    in_flight: DashMap<CacheKey, Arc<Notify>>,
    disk_dir: Option<PathBuf>,
}

impl ResultCache {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Shard::default()).collect(),
            budget_bytes,
            used_bytes: std::sync::atomic::AtomicUsize::new(0),
            in_flight: DashMap::new(),
            disk_dir: None,
        }
    }

    /// Enables disk persistence under `dir`: every `put` also writes a
    /// `(keyfile, payload)` pair so a later process run can warm-start
    /// from a previous one.
    pub fn with_disk_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.disk_dir = Some(dir.into());
        self
    }

    fn shard_for(&self, key: &CacheKey) -> &Shard {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(key, &mut hasher);
        let idx = (std::hash::Hasher::finish(&hasher) as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Non-blocking lookup; touches LRU order on hit. Falls through to
    /// disk (if configured) on an in-memory miss.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let shard = self.shard_for(key);
        if let Some(mut entry) = shard.entries.get_mut(key) {
            entry.last_accessed = chrono::Utc::now();
            let mut order = shard.order.lock().unwrap();
            order.retain(|k| k != key);
            order.push(key.clone());
            return Some(entry.clone());
        }
        if let Some(entry) = self.load_from_disk(key) {
            self.put_in_memory(key.clone(), entry.clone());
            return Some(entry);
        }
        None
    }

    /// Stores `entry`, evicting least-recently-used entries across shards
    /// until back under the byte budget. `ttl` is accepted for contract
    /// compatibility; entries are otherwise immutable once inserted and
    /// expiry is handled purely by LRU eviction pressure, not a timer.
    pub fn put(&self, key: CacheKey, entry: CacheEntry, _ttl: Option<std::time::Duration>) {
        self.persist_to_disk(&key, &entry);
        self.put_in_memory(key, entry);
    }

    fn put_in_memory(&self, key: CacheKey, entry: CacheEntry) {
        let shard = self.shard_for(&key);
        let size = entry.size_hint;
        if let Some(old) = shard.entries.insert(key.clone(), entry) {
            self.used_bytes.fetch_sub(old.size_hint, std::sync::atomic::Ordering::Relaxed);
        }
        self.used_bytes.fetch_add(size, std::sync::atomic::Ordering::Relaxed);
        {
            let mut order = shard.order.lock().unwrap();
            order.retain(|k| k != &key);
            order.push(key);
        }
        self.evict_if_over_budget();
    }

    fn evict_if_over_budget(&self) {
        while self.used_bytes.load(std::sync::atomic::Ordering::Relaxed) > self.budget_bytes {
            let victim = self
                .shards
                .iter()
                .filter_map(|shard| shard.order.lock().unwrap().first().cloned().map(|k| (shard, k)))
                .min_by_key(|(shard, key)| {
                    shard
                        .entries
                        .get(key)
                        .map(|e| e.last_accessed)
                        .unwrap_or_else(chrono::Utc::now)
                });

            let Some((shard, key)) = victim else { break };
            if let Some((_, removed)) = shard.entries.remove(&key) {
                self.used_bytes.fetch_sub(removed.size_hint, std::sync::atomic::Ordering::Relaxed);
            }
            shard.order.lock().unwrap().retain(|k| k != &key);
        }
    }

    /// Registers this key as having an in-flight build, or returns a
    /// handle to wait on if another caller already started one.
    pub fn start_build_or_wait(&self, key: &CacheKey) -> BuildSlot {
        match self.in_flight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => BuildSlot::Follower(existing.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let notify = Arc::new(Notify::new());
                vacant.insert(notify);
                BuildSlot::Leader
            }
        }
    }

    pub fn finish_build(&self, key: &CacheKey) {
        if let Some((_, notify)) = self.in_flight.remove(key) {
            notify.notify_waiters();
        }
    }

    fn load_from_disk(&self, key: &CacheKey) -> Option<CacheEntry> {
        let dir = self.disk_dir.as_ref()?;
        let payload_path = dir.join(format!("{}.payload.json", key.as_str()));
        let bytes = std::fs::read(payload_path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn persist_to_disk(&self, key: &CacheKey, entry: &CacheEntry) {
        let Some(dir) = &self.disk_dir else { return };
        if std::fs::create_dir_all(dir).is_err() {
            return;
        }
        let keyfile = DiskKeyFile {
            sha256: key.as_str().to_string(),
            options: serde_json::Value::Null,
            last_accessed: entry.last_accessed,
        };
        if let Ok(key_json) = serde_json::to_vec_pretty(&keyfile) {
            let _ = std::fs::write(dir.join(format!("{}.key.json", key.as_str())), key_json);
        }
        if let Ok(payload_json) = serde_json::to_vec(entry) {
            let _ = std::fs::write(dir.join(format!("{}.payload.json", key.as_str())), payload_json);
        }
    }
}

/// Returned by [`ResultCache::start_build_or_wait`]: the leader builds and
/// calls [`ResultCache::finish_build`]; followers await the notification.
pub enum BuildSlot {
    Leader,
    Follower(Arc<Notify>),
}

impl BuildSlot {
    pub async fn wait_if_follower(self) {
        if let BuildSlot::Follower(notify) = self {
            notify.notified().await;
        }
    }
}

pub async fn hash_file(path: &Path) -> PipelineResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(PipelineError::from)
}

pub fn entry_from_chunks(chunks: Vec<Chunk>) -> CacheEntry {
    CacheEntry::new(chunks)
}
