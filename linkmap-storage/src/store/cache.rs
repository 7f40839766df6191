// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keyed resource cache
//!
//! Per-table store handles are expensive to open and hold buffers of their
//! own, so they are pooled in a size- and time-bounded cache. Values that
//! fall out of the cache by size or expiry are closed; values removed
//! explicitly are left to the caller.

use super::{RowWrite, StatisticsStore, StoreError, TableName};
use async_trait::async_trait;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A resource released when it is evicted from a [`ResourceCache`].
pub trait Closeable: Send + Sync + 'static {
    fn close(&self);
}

impl<T: Closeable + ?Sized> Closeable for Arc<T> {
    fn close(&self) {
        (**self).close()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceCacheConfig {
    pub max_capacity: u64,
    pub initial_capacity: usize,
    pub time_to_live: Duration,
}

impl Default for ResourceCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            initial_capacity: 200,
            time_to_live: Duration::from_secs(10),
        }
    }
}

pub struct ResourceCache<K, V> {
    cache: Cache<K, V>,
}

impl<K, V> ResourceCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Closeable + Clone,
{
    pub fn new(config: &ResourceCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .initial_capacity(config.initial_capacity)
            .time_to_live(config.time_to_live)
            .eviction_listener(|_key: Arc<K>, value: V, cause: RemovalCause| {
                if cause.was_evicted() {
                    debug!(?cause, "closing evicted resource");
                    value.close();
                }
            })
            .build();
        Self { cache }
    }

    /// Cached value for `key`, opening it with `init` on a miss. Concurrent
    /// misses on the same key run `init` once.
    pub fn get_or_try_insert<E, F>(&self, key: K, init: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Result<V, E>,
        E: Send + Sync + 'static,
    {
        self.cache.try_get_with(key, init)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key)
    }

    /// Remove without closing.
    pub fn invalidate(&self, key: &K) {
        self.cache.invalidate(key);
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions now instead of on the next access.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

/// Cache key of a table handle: the table plus the worker pool it writes on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub table: TableName,
    pub pool: Option<String>,
}

impl TableKey {
    pub fn new(table: TableName, pool: Option<String>) -> Self {
        Self { table, pool }
    }
}

/// Open handle to one table.
#[async_trait]
pub trait TableMutator: Closeable {
    async fn mutate(&self, rows: &[RowWrite]) -> Result<(), StoreError>;
}

/// Opens table handles.
pub trait TableConnector: Send + Sync + 'static {
    type Mutator: TableMutator;

    fn connect(&self, key: &TableKey) -> Result<Self::Mutator, StoreError>;
}

/// [`StatisticsStore`] that writes through pooled per-table mutators.
pub struct CachedTableStore<C: TableConnector> {
    connector: C,
    pool: Option<String>,
    mutators: ResourceCache<TableKey, Arc<C::Mutator>>,
}

impl<C: TableConnector> CachedTableStore<C> {
    pub fn new(connector: C, pool: Option<String>, config: &ResourceCacheConfig) -> Self {
        Self {
            connector,
            pool,
            mutators: ResourceCache::new(config),
        }
    }

    pub fn mutators(&self) -> &ResourceCache<TableKey, Arc<C::Mutator>> {
        &self.mutators
    }

    fn mutator(&self, table: &TableName) -> Result<Arc<C::Mutator>, StoreError> {
        let key = TableKey::new(table.clone(), self.pool.clone());
        self.mutators
            .get_or_try_insert(key.clone(), || {
                debug!(table = %key.table, pool = ?key.pool, "opening table mutator");
                self.connector.connect(&key).map(Arc::new)
            })
            .map_err(|e| (*e).clone())
    }
}

#[async_trait]
impl<C: TableConnector> StatisticsStore for CachedTableStore<C> {
    async fn write(&self, table: &TableName, rows: &[RowWrite]) -> Result<(), StoreError> {
        let mutator = self.mutator(table)?;
        mutator.mutate(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Handle {
        closed: Arc<AtomicUsize>,
    }

    impl Closeable for Handle {
        fn close(&self) {
            self.closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn config(ttl: Duration) -> ResourceCacheConfig {
        ResourceCacheConfig {
            max_capacity: 10,
            initial_capacity: 2,
            time_to_live: ttl,
        }
    }

    #[test]
    fn test_init_runs_once_per_key() {
        let cache: ResourceCache<&'static str, Arc<Handle>> =
            ResourceCache::new(&config(Duration::from_secs(60)));
        let closed = Arc::new(AtomicUsize::new(0));
        let opened = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_try_insert("t", || {
                    opened.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, StoreError>(Arc::new(Handle { closed: closed.clone() }))
                })
                .unwrap();
        }
        assert_eq!(opened.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failed_init_is_not_cached() {
        let cache: ResourceCache<&'static str, Arc<Handle>> =
            ResourceCache::new(&config(Duration::from_secs(60)));
        let result = cache.get_or_try_insert("t", || Err(StoreError::Unavailable("down".into())));
        assert_eq!(*result.err().unwrap(), StoreError::Unavailable("down".into()));
        assert!(cache.get(&"t").is_none());
    }

    #[test]
    fn test_expired_values_are_closed() {
        let cache: ResourceCache<&'static str, Arc<Handle>> =
            ResourceCache::new(&config(Duration::from_millis(20)));
        let closed = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_try_insert("t", || {
                Ok::<_, StoreError>(Arc::new(Handle {
                    closed: closed.clone(),
                }))
            })
            .unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert!(cache.get(&"t").is_none());
        cache.run_pending_tasks();
        assert_eq!(closed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_invalidated_values_are_not_closed() {
        let cache: ResourceCache<&'static str, Arc<Handle>> =
            ResourceCache::new(&config(Duration::from_secs(60)));
        let closed = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_try_insert("t", || {
                Ok::<_, StoreError>(Arc::new(Handle {
                    closed: closed.clone(),
                }))
            })
            .unwrap();

        cache.invalidate(&"t");
        cache.run_pending_tasks();
        assert_eq!(closed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_cached_store_reuses_mutator() {
        let backend = InMemoryStore::new();
        let store = CachedTableStore::new(backend.clone(), None, &ResourceCacheConfig::default());
        let table = TableName::new("Map");
        let mut row = RowWrite::new(Bytes::from_static(b"row"));
        row.increments.insert(Bytes::from_static(b"c"), 2);

        store.write(&table, &[row.clone()]).await.unwrap();
        store.write(&table, &[row]).await.unwrap();
        store.mutators().run_pending_tasks();

        assert_eq!(backend.get(&table, b"row", b"c"), Some(4));
        assert_eq!(store.mutators().entry_count(), 1);
        assert_eq!(backend.closed_mutators(), 0);
    }
}
