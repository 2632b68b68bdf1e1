//! Keyed result cache with freshness and idle-collection windows, plus the
//! table of fetches currently in flight.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::debug;

use crate::{error::FetchResult, normalize::QueryKey};

pub const SEARCH_STALE_TIME: Duration = Duration::from_secs(30);
pub const SEARCH_GC_TIME: Duration = Duration::from_secs(5 * 60);

pub(crate) type SharedFetch<V> = Shared<BoxFuture<'static, FetchResult<Arc<V>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long an entry is served without refetching. `None` never goes stale.
    pub stale_time: Option<Duration>,
    /// Idle time after which an entry is dropped. `None` keeps it forever.
    pub gc_time: Option<Duration>,
}

impl CachePolicy {
    pub const fn forever() -> Self {
        Self {
            stale_time: None,
            gc_time: None,
        }
    }

    pub const fn search_default() -> Self {
        Self {
            stale_time: Some(SEARCH_STALE_TIME),
            gc_time: Some(SEARCH_GC_TIME),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CacheLookup<V> {
    Fresh(Arc<V>),
    /// Past its freshness window but not yet collected.
    Stale(Arc<V>),
    Missing,
}

struct CacheEntry<V> {
    value: Arc<V>,
    fetched_at: Instant,
    last_used: Instant,
}

pub(crate) struct QueryStore<V> {
    policy: CachePolicy,
    entries: HashMap<QueryKey, CacheEntry<V>>,
    pub(crate) inflight: HashMap<QueryKey, SharedFetch<V>>,
}

impl<V> QueryStore<V> {
    pub(crate) fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            inflight: HashMap::new(),
        }
    }

    /// Drops entries that have not been read or written for `gc_time`.
    pub(crate) fn evict_idle(&mut self, now: Instant) -> usize {
        let Some(gc_time) = self.policy.gc_time else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = now.duration_since(entry.last_used) < gc_time;
            if !keep {
                debug!(key = %key, "cache: evicting idle entry");
            }
            keep
        });
        before - self.entries.len()
    }

    /// Classifies the entry for `key` and marks it as used.
    pub(crate) fn lookup(&mut self, key: &QueryKey, now: Instant) -> CacheLookup<V> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used = now;
        }
        self.peek(key, now)
    }

    /// Like [`QueryStore::lookup`] but leaves the idle clock alone.
    pub(crate) fn peek(&self, key: &QueryKey, now: Instant) -> CacheLookup<V> {
        let Some(entry) = self.entries.get(key) else {
            return CacheLookup::Missing;
        };
        let fresh = match self.policy.stale_time {
            Some(stale_time) => now.duration_since(entry.fetched_at) < stale_time,
            None => true,
        };
        if fresh {
            CacheLookup::Fresh(Arc::clone(&entry.value))
        } else {
            CacheLookup::Stale(Arc::clone(&entry.value))
        }
    }

    /// Replaces any previous value for `key` wholesale.
    pub(crate) fn insert(&mut self, key: QueryKey, value: Arc<V>, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: now,
                last_used: now,
            },
        );
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
