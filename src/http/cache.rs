// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A keyed pool of reusable connections, grounded on
//! `http_connection_cache.c`. The original schedules a single timer to
//! expire the single oldest entry; this port instead sweeps expired
//! entries lazily on every [`ConnectionCache::put`] and
//! [`ConnectionCache::take`], which is simpler and needs no background
//! task, at the cost of a cache that can (briefly) hold more expired
//! entries than the original between calls.

use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

struct Entry<C> {
    conn: C,
    expires_at: Instant,
}

struct State<K, C> {
    entries: HashMap<K, Vec<Entry<C>>>,
    len: usize,
}

/// A cache of idle connections keyed by `K` (typically a remote
/// address), each entry expiring `ttl` after it was put back.
pub struct ConnectionCache<K, C> {
    state: Mutex<State<K, C>>,
    max_entries: usize,
    ttl: Duration,
}

impl<K, C> ConnectionCache<K, C>
where
    K: Eq + Hash + Clone,
{
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        ConnectionCache { state: Mutex::new(State { entries: HashMap::new(), len: 0 }), max_entries, ttl }
    }

    /// Hand back an idle connection for `key`, evicting the globally
    /// oldest entry first if the cache is already at capacity.
    pub async fn put(&self, key: K, conn: C) {
        if self.max_entries == 0 {
            return;
        }
        let now = Instant::now();
        let mut state = self.state.lock().await;
        sweep_expired(&mut state, now);

        if state.len >= self.max_entries {
            evict_oldest(&mut state);
        }

        state.entries.entry(key).or_default().push(Entry { conn, expires_at: now + self.ttl });
        state.len += 1;
    }

    /// Take a cached connection for `key`, if one exists and has not
    /// expired.
    pub async fn take(&self, key: &K) -> Option<C> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        sweep_expired(&mut state, now);

        let bucket = state.entries.get_mut(key)?;
        let entry = bucket.pop()?;
        state.len -= 1;
        if bucket.is_empty() {
            state.entries.remove(key);
        }
        Some(entry.conn)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.len = 0;
    }
}

fn sweep_expired<K: Eq + Hash + Clone, C>(state: &mut State<K, C>, now: Instant) {
    let mut removed = 0;
    state.entries.retain(|_, bucket| {
        let before = bucket.len();
        bucket.retain(|e| e.expires_at > now);
        removed += before - bucket.len();
        !bucket.is_empty()
    });
    state.len -= removed;
}

fn evict_oldest<K: Eq + Hash + Clone, C>(state: &mut State<K, C>) {
    let oldest_key = state
        .entries
        .iter()
        .filter_map(|(k, bucket)| bucket.iter().map(|e| e.expires_at).min().map(|t| (k.clone(), t)))
        .min_by_key(|(_, t)| *t)
        .map(|(k, _)| k);

    let Some(key) = oldest_key else { return };
    if let Some(bucket) = state.entries.get_mut(&key) {
        let idx = bucket
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.expires_at)
            .map(|(i, _)| i)
            .expect("bucket is non-empty");
        bucket.remove(idx);
        state.len -= 1;
        if bucket.is_empty() {
            state.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_take_round_trips() {
        let cache: ConnectionCache<String, u32> = ConnectionCache::new(4, Duration::from_secs(60));
        cache.put("a".to_string(), 1).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.take(&"a".to_string()).await, Some(1));
        assert_eq!(cache.take(&"a".to_string()).await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_swept_lazily() {
        let cache: ConnectionCache<String, u32> = ConnectionCache::new(4, Duration::from_millis(10));
        cache.put("a".to_string(), 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.take(&"a".to_string()).await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn over_capacity_evicts_oldest() {
        let cache: ConnectionCache<u32, u32> = ConnectionCache::new(2, Duration::from_secs(60));
        cache.put(1, 10).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(2, 20).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(3, 30).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.take(&1).await, None);
        assert_eq!(cache.take(&2).await, Some(20));
        assert_eq!(cache.take(&3).await, Some(30));
    }
}
