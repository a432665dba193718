use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::{Expiry, future::Cache};
use tracing::debug;

const SOURCE: &str = "pagebits::cache::store";

/// Generic key/value store with a TTL per entry.
///
/// Reads and writes are independent and last-writer-wins.
#[async_trait]
pub trait CacheStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V>;

    async fn set(&self, key: &str, value: V, ttl: Duration);

    async fn delete(&self, key: &str);

    async fn clear(&self);
}

#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: Duration,
}

struct PerEntryTtl;

impl<V> Expiry<String, Entry<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store backed by `moka`.
pub struct MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, Entry<V>>,
}

impl<V> MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }
}

#[async_trait]
impl<V> CacheStore<V> for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) {
        debug!(target = SOURCE, key, ttl_secs = ttl.as_secs(), "cache set");
        self.inner.insert(key.to_string(), Entry { value, ttl }).await;
    }

    async fn delete(&self, key: &str) {
        debug!(target = SOURCE, key, "cache delete");
        self.inner.invalidate(key).await;
    }

    async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let store = MokaStore::new(16);
        store.set("k", 7_u32, Duration::from_secs(60)).await;
        assert_eq!(store.get("k").await, Some(7));
        assert_eq!(store.get("missing").await, None);
    }

    #[tokio::test]
    async fn delete_and_clear_remove_entries() {
        let store = MokaStore::new(16);
        store.set("a", "one".to_string(), Duration::from_secs(60)).await;
        store.set("b", "two".to_string(), Duration::from_secs(60)).await;

        store.delete("a").await;
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await.as_deref(), Some("two"));

        store.clear().await;
        assert_eq!(store.get("b").await, None);
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let store = MokaStore::new(16);
        store.set("short", 1_u8, Duration::from_millis(50)).await;
        store.set("long", 2_u8, Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("short").await, None);
        assert_eq!(store.get("long").await, Some(2));
    }
}
