//! Webpage fetch cache.
//!
//! Successful `web_fetch` results are memoized by normalized URL so a
//! repeated fetch within a session is served locally. Entries live until
//! [`FetchCache::clear`] or [`FetchCache::invalidate`] unless the cache
//! was built with a max-entry bound or a TTL.
//!
//! Thread-safe via `RwLock<CacheState>`. The lock is never held across the
//! fetch itself, so concurrent misses for one key may each fetch; the last
//! write wins.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use clawgate_types::config::FetchCacheConfig;
use tracing::debug;
use url::Url;

use crate::url_safety::normalize_target;

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL the content was finally served from (after redirects).
    pub final_url: String,
    pub title: Option<String>,
    /// Full extracted text, before any per-call truncation.
    pub content: String,
    pub content_type: String,
}

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Cached,
    Fresh,
}

/// A page plus its cache provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup {
    pub page: FetchedPage,
    pub fetched_at: DateTime<Utc>,
    pub freshness: Freshness,
}

impl CacheLookup {
    pub fn is_cached(&self) -> bool {
        self.freshness == Freshness::Cached
    }
}

struct CacheEntry {
    page: FetchedPage,
    fetched_at: DateTime<Utc>,
    stored_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

/// Memoizes fetched pages keyed by normalized URL.
#[derive(Default)]
pub struct FetchCache {
    state: RwLock<CacheState>,
    max_entries: Option<usize>,
    ttl: Option<Duration>,
}

impl FetchCache {
    /// An unbounded cache without expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that keeps at most `max_entries` (evicting the least
    /// recently inserted) and drops entries older than `ttl` on lookup.
    pub fn with_limits(max_entries: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries: max_entries.map(|n| n.max(1)),
            ttl,
        }
    }

    pub fn from_config(cfg: &FetchCacheConfig) -> Self {
        Self::with_limits(cfg.max_entries, cfg.ttl_secs.map(Duration::from_secs))
    }

    /// Canonical cache key for `url`.
    ///
    /// Scheme and host are lower-cased, the default port and the fragment
    /// are dropped and query pairs are sorted. Input that does not parse
    /// is keyed by its trimmed text.
    pub fn normalize_key(url: &str) -> String {
        let Ok(mut parsed) = Url::parse(&normalize_target(url)) else {
            return url.trim().to_string();
        };
        parsed.set_fragment(None);

        let mut pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.is_empty() {
            parsed.set_query(None);
        } else {
            pairs.sort();
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
        }
        parsed.into()
    }

    /// Look up `url`. Expired entries are removed and reported as a miss.
    pub fn get(&self, url: &str) -> Option<CacheLookup> {
        let key = Self::normalize_key(url);
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            match state.entries.get(&key) {
                None => return None,
                Some(entry) if !self.is_expired(entry) => {
                    return Some(CacheLookup {
                        page: entry.page.clone(),
                        fetched_at: entry.fetched_at,
                        freshness: Freshness::Cached,
                    });
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check: another writer may have refreshed it meanwhile.
        if state.entries.get(&key).is_some_and(|e| self.is_expired(e)) {
            debug!(key = %key, "cache entry expired");
            state.remove(&key);
        }
        None
    }

    /// Store `page` under `url`, replacing any existing entry.
    pub fn insert(&self, url: &str, page: FetchedPage) -> DateTime<Utc> {
        let key = Self::normalize_key(url);
        let fetched_at = Utc::now();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        state.remove(&key);
        state.entries.insert(
            key.clone(),
            CacheEntry {
                page,
                fetched_at,
                stored_at: Instant::now(),
            },
        );
        state.order.push_back(key);

        if let Some(max) = self.max_entries {
            while state.entries.len() > max {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                debug!(key = %oldest, "evicting oldest cache entry");
                state.entries.remove(&oldest);
            }
        }
        fetched_at
    }

    /// Return the cached page for `url`, or run `fetch` and cache its
    /// success. Failures are propagated and not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, url: &str, fetch: F) -> Result<CacheLookup, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedPage, E>>,
    {
        if let Some(hit) = self.get(url) {
            debug!(url, "fetch cache hit");
            return Ok(hit);
        }

        debug!(url, "fetch cache miss");
        let page = fetch().await?;
        let fetched_at = self.insert(url, page.clone());
        Ok(CacheLookup {
            page,
            fetched_at,
            freshness: Freshness::Fresh,
        })
    }

    /// Remove the entry for `url`. Returns whether one existed.
    pub fn invalidate(&self, url: &str) -> bool {
        let key = Self::normalize_key(url);
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
    }

    /// Remove every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = state.entries.len();
        state.entries.clear();
        state.order.clear();
        debug!(removed, "fetch cache cleared");
        removed
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() > ttl)
    }
}
