//! Response cache: fingerprint -> synthesized payload.
//!
//! Bounded by entry count (LRU eviction on insert) and by age (TTL, checked
//! lazily on read). The map and its recency order live in one
//! `lru::LruCache` behind a single mutex, so they can never disagree.
//! Counters are atomics so `stats()` doesn't contend with lookups.

use std::convert::Infallible;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Immutable view of cached audio bytes. Cloning is a refcount bump.
pub type Payload = Arc<[u8]>;

#[derive(Debug)]
struct CacheEntry {
    payload: Payload,
    created_at: Instant,
    last_accessed: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}

enum Lookup<T> {
    Hit(Payload, T),
    Expired,
    Corrupt(String),
    Absent,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    hit_latency_ns: AtomicU64,
    miss_latency_ns: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.hit_latency_ns.store(0, Ordering::Relaxed);
        self.miss_latency_ns.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0.0 before the first lookup.
    pub hit_rate: f64,
    pub size: usize,
    pub capacity: usize,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Mean time spent inside `get` for hits, in milliseconds.
    pub avg_hit_latency_ms: f64,
    /// Mean time spent inside `get` for misses, in milliseconds.
    pub avg_miss_latency_ms: f64,
}

/// Thread-safe LRU + TTL cache of synthesis results.
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
    counters: Counters,
}

impl ResultCache {
    /// Build a cache holding at most `capacity` entries, each visible for
    /// at most `ttl` after insertion.
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self, ConfigError> {
        let cap = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        if ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        Ok(Self {
            entries: Mutex::new(LruCache::new(cap)),
            capacity,
            ttl,
            counters: Counters::default(),
        })
    }

    /// Look up a payload. Expired entries are removed and reported as a miss.
    pub fn get(&self, fingerprint: &str) -> Option<Payload> {
        self.get_at(fingerprint, Instant::now())
    }

    /// [`get`](Self::get) against an explicit clock reading.
    pub fn get_at(&self, fingerprint: &str, now: Instant) -> Option<Payload> {
        self.lookup(fingerprint, now, |_| Ok::<_, Infallible>(()))
            .map(|(payload, ())| payload)
    }

    /// Look up a payload and run `decode` on it under the cache lock.
    ///
    /// A payload that fails to decode is purged and counted as a miss, so
    /// callers never see it and the hit rate never includes it.
    pub fn get_decoded<T, E, F>(&self, fingerprint: &str, decode: F) -> Option<(Payload, T)>
    where
        E: fmt::Display,
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        self.lookup(fingerprint, Instant::now(), decode)
    }

    fn lookup<T, E, F>(&self, fingerprint: &str, now: Instant, decode: F) -> Option<(Payload, T)>
    where
        E: fmt::Display,
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let started = Instant::now();

        let lookup = {
            let mut entries = self.entries.lock();
            let lookup = match entries.get_mut(fingerprint) {
                Some(entry) if entry.is_fresh(now, self.ttl) => match decode(&entry.payload) {
                    Ok(decoded) => {
                        entry.last_accessed = now;
                        Lookup::Hit(entry.payload.clone(), decoded)
                    }
                    Err(e) => Lookup::Corrupt(e.to_string()),
                },
                Some(_) => Lookup::Expired,
                None => Lookup::Absent,
            };
            if matches!(lookup, Lookup::Expired | Lookup::Corrupt(_)) {
                entries.pop(fingerprint);
            }
            lookup
        };

        let elapsed = started.elapsed().as_nanos() as u64;
        match lookup {
            Lookup::Hit(payload, decoded) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                self.counters.hit_latency_ns.fetch_add(elapsed, Ordering::Relaxed);
                Some((payload, decoded))
            }
            Lookup::Expired => {
                debug!(fingerprint, "cache entry expired");
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                self.record_miss(elapsed);
                None
            }
            Lookup::Corrupt(error) => {
                warn!(fingerprint, %error, "purging undecodable cache entry");
                self.record_miss(elapsed);
                None
            }
            Lookup::Absent => {
                self.record_miss(elapsed);
                None
            }
        }
    }

    fn record_miss(&self, elapsed_ns: u64) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.miss_latency_ns.fetch_add(elapsed_ns, Ordering::Relaxed);
    }

    /// Insert or overwrite. A new key on a full cache first evicts the
    /// least-recently-accessed entry.
    pub fn put(&self, fingerprint: impl Into<String>, payload: impl Into<Payload>) {
        self.put_at(fingerprint, payload, Instant::now())
    }

    /// [`put`](Self::put) against an explicit clock reading.
    pub fn put_at(&self, fingerprint: impl Into<String>, payload: impl Into<Payload>, now: Instant) {
        let key = fingerprint.into();
        let entry = CacheEntry {
            payload: payload.into(),
            created_at: now,
            last_accessed: now,
        };

        let displaced = self.entries.lock().push(key.clone(), entry);
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);

        // `push` hands back the old value on overwrite, or the LRU victim.
        if let Some((evicted, old)) = displaced {
            if evicted != key {
                debug!(
                    fingerprint = %evicted,
                    idle_ms = now.saturating_duration_since(old.last_accessed).as_millis() as u64,
                    "evicted least-recently-used entry"
                );
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, fingerprint: &str) -> bool {
        self.entries.lock().pop(fingerprint).is_some()
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// [`purge_expired`](Self::purge_expired) against an explicit clock reading.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now, self.ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        drop(entries);

        if !stale.is_empty() {
            self.counters
                .expirations
                .fetch_add(stale.len() as u64, Ordering::Relaxed);
            debug!(count = stale.len(), "purged expired cache entries");
        }
        stale.len()
    }

    /// Empty the cache and return how many entries were dropped.
    /// Hit/miss counters are kept; see [`reset_stats`](Self::reset_stats).
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Zero all counters without touching stored entries.
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        let hits = c.hits.load(Ordering::Relaxed);
        let misses = c.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            size: self.len(),
            capacity: self.capacity,
            inserts: c.inserts.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            avg_hit_latency_ms: mean_ms(c.hit_latency_ns.load(Ordering::Relaxed), hits),
            avg_miss_latency_ms: mean_ms(c.miss_latency_ns.load(Ordering::Relaxed), misses),
        }
    }
}

fn mean_ms(total_ns: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_ns as f64 / count as f64 / 1_000_000.0
    }
}
