use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Process-local read-through cache with per-entry TTL. Backs the router's
/// approved-tenant and active-onboarding lookups so hot webhook traffic does
/// not hammer the database.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn invalidate(&self, key: &K) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    pub async fn sweep(&self) {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }
}

/// Periodic sweeper so abandoned keys do not accumulate between reads.
pub fn spawn_sweeper<K, V>(cache: Arc<TtlCache<K, V>>, every: Duration)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            cache.sweep().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_value_within_ttl() {
        let cache: TtlCache<i64, bool> = TtlCache::new(Duration::from_secs(60));
        cache.insert(-1001, true).await;
        assert_eq!(cache.get(&-1001).await, Some(true));
        assert_eq!(cache.get(&-2002).await, None);
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache: TtlCache<i64, bool> = TtlCache::new(Duration::from_millis(10));
        cache.insert(-1001, true).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(&-1001).await, None);
    }

    #[tokio::test]
    async fn sweep_drops_expired_entries() {
        let cache: TtlCache<i64, bool> = TtlCache::new(Duration::from_millis(10));
        cache.insert(1, true).await;
        cache.insert(2, false).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        cache.sweep().await;
        let entries = cache.entries.read().await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn invalidate_removes_a_single_key() {
        let cache: TtlCache<i64, bool> = TtlCache::new(Duration::from_secs(60));
        cache.insert(1, true).await;
        cache.insert(2, true).await;
        cache.invalidate(&1).await;
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&2).await, Some(true));
    }
}
