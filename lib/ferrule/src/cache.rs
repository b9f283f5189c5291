//! In-memory response cache.
//!
//! Entries are evicted in insertion order once the store is full, and
//! removed by a scheduled timer when their time-to-live elapses. Reads hand
//! out independent copies tagged as served from the cache.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use ferrule_core::{RequestConfig, Response, Result};
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Deterministic cache key of a logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

#[derive(Serialize)]
struct KeyParts<'a> {
    url: &'a str,
    params: &'a [(String, String)],
    method: &'a str,
}

impl CacheKey {
    /// Derive the key from the URL, the sorted query parameters and the
    /// method of `config`.
    ///
    /// A query string written into the URL is merged with the parameter
    /// list, so both spellings of one request share a key.
    ///
    /// # Errors
    ///
    /// Fails when the URL cannot be resolved against the base URL.
    pub fn from_config(config: &RequestConfig) -> Result<Self> {
        let mut url = config.joined_url()?;
        let mut params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        params.extend(config.params.iter().cloned());
        params.sort_unstable();
        url.set_query(None);

        let parts = KeyParts {
            url: url.as_str(),
            params: &params,
            method: config.method.as_str(),
        };
        Ok(Self(serde_json::to_string(&parts)?))
    }

    /// Key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

struct Entry {
    response: Response,
    generation: u64,
    expires_at: Option<Instant>,
    timer: Option<AbortHandle>,
}

impl Entry {
    fn cancel_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<CacheKey, Entry>,
    order: VecDeque<CacheKey>,
    next_generation: u64,
}

impl State {
    fn remove(&mut self, key: &CacheKey) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|other| other != key);
        entry.cancel_timer();
        Some(entry)
    }
}

/// Key to response store with FIFO capacity and per-entry expiry.
pub struct CacheStore {
    state: Arc<Mutex<State>>,
    max_entries: usize,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CacheStore {
    /// Create a store holding at most `max_entries` responses; zero means
    /// unbounded.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Arc::default(),
            max_entries,
        }
    }

    /// Capacity; zero means unbounded.
    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the stored response, tagged as served from the cache.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Response> {
        let mut state = lock(&self.state);
        let expired = state
            .entries
            .get(key)?
            .expires_at
            .is_some_and(|deadline| deadline <= Instant::now());
        if expired {
            state.remove(key);
            tracing::debug!(%key, "cache entry expired");
            return None;
        }

        state
            .entries
            .get(key)
            .map(|entry| entry.response.clone().with_from_cache(true))
    }

    /// Store `response` under `key`.
    ///
    /// A zero `ttl`, or one too large for the clock, keeps the entry until
    /// it is evicted or deleted. When the store is full the oldest inserted
    /// entry is evicted first.
    pub fn set(&self, key: CacheKey, response: Response, ttl: Duration) {
        let mut state = lock(&self.state);
        state.remove(&key);

        if self.max_entries > 0 {
            while state.entries.len() >= self.max_entries {
                let Some(oldest) = state.order.front().cloned() else {
                    break;
                };
                state.remove(&oldest);
                tracing::debug!(key = %oldest, "cache entry evicted");
            }
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        // A deadline past the clock's range never expires.
        let (expires_at, timer) = match Instant::now().checked_add(ttl) {
            Some(deadline) if !ttl.is_zero() => {
                let timer = self.schedule_expiry(key.clone(), generation, ttl);
                (Some(deadline), timer)
            }
            _ => (None, None),
        };

        state.order.push_back(key.clone());
        state.entries.insert(
            key,
            Entry {
                response: response.with_from_cache(false),
                generation,
                expires_at,
                timer,
            },
        );
    }

    /// Remove `key`; returns `true` if it was present.
    pub fn delete(&self, key: &CacheKey) -> bool {
        lock(&self.state).remove(key).is_some()
    }

    /// Remove every entry and cancel all pending expiry timers.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        for entry in state.entries.values() {
            entry.cancel_timer();
        }
        state.entries.clear();
        state.order.clear();
    }

    fn schedule_expiry(&self, key: CacheKey, generation: u64, ttl: Duration) -> Option<AbortHandle> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let state: Weak<Mutex<State>> = Arc::downgrade(&self.state);

        let task = handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = lock(&state);
            if state
                .entries
                .get(&key)
                .is_some_and(|entry| entry.generation == generation)
            {
                state.entries.remove(&key);
                state.order.retain(|other| other != &key);
                tracing::debug!(%key, "cache entry expired");
            }
        });
        Some(task.abort_handle())
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use ferrule_core::{Method, RequestOptions};
    use http::HeaderMap;

    use super::*;

    fn response(body: &'static str) -> Response {
        Response::new(200, HeaderMap::new(), body)
    }

    #[test]
    fn key_is_independent_of_param_order() {
        let first = RequestOptions::new()
            .param("b", "2")
            .param("a", "1")
            .resolve("https://example.com/items")
            .expect("resolve");
        let second = RequestOptions::new()
            .param("a", "1")
            .param("b", "2")
            .resolve("https://example.com/items")
            .expect("resolve");

        let key = CacheKey::from_config(&first).expect("key");
        check!(key == CacheKey::from_config(&second).expect("key"));
        insta::assert_snapshot!(key, @r#"{"url":"https://example.com/items","params":[["a","1"],["b","2"]],"method":"GET"}"#);
    }

    #[test]
    fn key_merges_query_written_in_url() {
        let inline = RequestOptions::new()
            .resolve("https://example.com/items?b=2&a=1")
            .expect("resolve");
        let reordered = RequestOptions::new()
            .resolve("https://example.com/items?a=1&b=2")
            .expect("resolve");
        let split = RequestOptions::new()
            .param("a", "1")
            .resolve("https://example.com/items?b=2")
            .expect("resolve");

        let key = CacheKey::from_config(&inline).expect("key");
        check!(key == CacheKey::from_config(&reordered).expect("key"));
        check!(key == CacheKey::from_config(&split).expect("key"));
        insta::assert_snapshot!(key, @r#"{"url":"https://example.com/items","params":[["a","1"],["b","2"]],"method":"GET"}"#);
    }

    #[test]
    fn key_distinguishes_methods() {
        let get = RequestOptions::new()
            .resolve("https://example.com/items")
            .expect("resolve");
        let delete = RequestOptions::new()
            .method(Method::Delete)
            .resolve("https://example.com/items")
            .expect("resolve");
        let get_key = CacheKey::from_config(&get).expect("key");
        check!(get_key != CacheKey::from_config(&delete).expect("key"));
    }

    #[test]
    fn get_returns_tagged_copy() {
        let store = CacheStore::default();
        store.set("k".into(), response("hello"), Duration::ZERO);

        let mut copy = store.get(&"k".into()).expect("hit");
        check!(copy.from_cache());
        check!(copy.body().as_ref() == b"hello");

        copy.headers_mut()
            .insert("x-mutated", http::HeaderValue::from_static("yes"));
        let again = store.get(&"k".into()).expect("hit");
        check!(again.header("x-mutated").is_none());
    }

    #[test]
    fn capacity_evicts_oldest_inserted() {
        let store = CacheStore::new(2);
        store.set("k1".into(), response("1"), Duration::ZERO);
        store.set("k2".into(), response("2"), Duration::ZERO);
        // Reading k1 does not refresh its position.
        check!(store.get(&"k1".into()).is_some());
        store.set("k3".into(), response("3"), Duration::ZERO);

        check!(store.len() == 2);
        check!(store.get(&"k1".into()).is_none());
        check!(store.get(&"k2".into()).is_some());
        check!(store.get(&"k3".into()).is_some());
    }

    #[test]
    fn overwrite_moves_entry_to_newest() {
        let store = CacheStore::new(2);
        store.set("k1".into(), response("1"), Duration::ZERO);
        store.set("k2".into(), response("2"), Duration::ZERO);
        store.set("k1".into(), response("1b"), Duration::ZERO);
        store.set("k3".into(), response("3"), Duration::ZERO);

        check!(store.get(&"k2".into()).is_none());
        check!(store.get(&"k1".into()).expect("hit").body().as_ref() == b"1b");
    }

    #[test]
    fn delete_and_clear() {
        let store = CacheStore::default();
        store.set("a".into(), response("a"), Duration::ZERO);
        store.set("b".into(), response("b"), Duration::ZERO);

        check!(store.delete(&"a".into()));
        check!(!store.delete(&"a".into()));
        store.clear();
        check!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expires_entries() {
        let store = CacheStore::default();
        store.set("k".into(), response("v"), Duration::from_millis(5000));

        tokio::time::advance(Duration::from_millis(4999)).await;
        check!(store.get(&"k".into()).is_some());

        tokio::time::sleep(Duration::from_millis(2)).await;
        check!(store.get(&"k".into()).is_none());
        check!(store.is_empty());
    }

    #[tokio::test]
    async fn ttl_beyond_clock_range_never_expires() {
        let store = CacheStore::default();
        store.set("k".into(), response("v"), Duration::MAX);

        let hit = store.get(&"k".into()).expect("hit");
        check!(hit.body().as_ref() == b"v");
        check!(store.len() == 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_timer_does_not_remove_reused_key() {
        let store = CacheStore::default();
        store.set("k".into(), response("old"), Duration::from_millis(100));
        store.delete(&"k".into());
        store.set("k".into(), response("new"), Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(200)).await;
        check!(store.get(&"k".into()).expect("hit").body().as_ref() == b"new");
    }
}
