//! A production-ready memory-based kv store.

use rendezvous_api::*;
use std::sync::Arc;

/// MemKvStore configuration types.
pub mod config {
    /// Configuration parameters for
    /// [MemKvStoreFactory](super::MemKvStoreFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct MemKvStoreConfig {
        /// The interval in milliseconds at which expired values are
        /// swept from memory. Expiry itself is checked on every read,
        /// this only reclaims memory.
        ///
        /// Default: 60s.
        pub sweep_interval_ms: u32,
    }

    impl Default for MemKvStoreConfig {
        fn default() -> Self {
            Self {
                sweep_interval_ms: 1000 * 60,
            }
        }
    }

    impl MemKvStoreConfig {
        /// Get the sweep interval as a [std::time::Duration].
        pub fn sweep_interval(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.sweep_interval_ms as u64)
        }
    }

    /// Module-level configuration for MemKvStore.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct MemKvStoreModConfig {
        /// MemKvStore configuration.
        pub mem_kv_store: MemKvStoreConfig,
    }
}

pub use config::*;

/// A production-ready memory-based kv store factory.
///
/// Values live in a sharded concurrent map inside this process. Use this
/// when a single server process owns all presence and session state.
#[derive(Debug)]
pub struct MemKvStoreFactory {}

impl MemKvStoreFactory {
    /// Construct a new MemKvStoreFactory.
    pub fn create() -> DynKvStoreFactory {
        let out: DynKvStoreFactory = Arc::new(Self {});
        out
    }
}

impl KvStoreFactory for MemKvStoreFactory {
    fn default_config(&self, config: &mut Config) -> RvResult<()> {
        config.set_module_config(&MemKvStoreModConfig::default())
    }

    fn validate_config(&self, config: &Config) -> RvResult<()> {
        let config: MemKvStoreModConfig = config.get_module_config()?;
        if config.mem_kv_store.sweep_interval_ms == 0 {
            return Err(RvError::validation("sweepIntervalMs must be > 0"));
        }
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, RvResult<DynKvStore>> {
        Box::pin(async move {
            let config: MemKvStoreModConfig =
                builder.config.get_module_config()?;
            let out: DynKvStore = Arc::new(MemKvStore::new(
                config.mem_kv_store,
                builder.clock.clone(),
            ));
            Ok(out)
        })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: bytes::Bytes,
    expires_at: Timestamp,
}

/// The shared map. Every key lives in one of the dashmap shards, so
/// operations on different keys rarely contend and no operation ever
/// holds more than one shard lock.
#[derive(Debug)]
struct KvMap {
    clock: DynClock,
    map: dashmap::DashMap<String, Entry>,
}

impl KvMap {
    fn new(clock: DynClock) -> Self {
        Self {
            clock,
            map: dashmap::DashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<bytes::Bytes> {
        let now = self.clock.now();

        if let Some(e) = self.map.get(key) {
            if e.expires_at > now {
                return Some(e.value.clone());
            }
        } else {
            return None;
        }

        // expired but not yet swept: drop it, unless a concurrent
        // set already replaced it with a live value
        self.map.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    fn set(&self, key: &str, value: bytes::Bytes, ttl: std::time::Duration) {
        let expires_at = self.clock.now() + ttl;
        self.map
            .insert(key.to_string(), Entry { value, expires_at });
    }

    fn remove(&self, key: &str) {
        self.map.remove(key);
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        let now = self.clock.now();
        self.map
            .iter()
            .filter(|e| {
                e.value().expires_at > now && e.key().starts_with(prefix)
            })
            .map(|e| e.key().clone())
            .collect()
    }

    /// Drop everything whose ttl has passed as of `now`.
    /// Returns the number of entries removed.
    fn sweep(&self, now: Timestamp) -> usize {
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.map.len())
    }
}

struct MemKvStore {
    map: Arc<KvMap>,
    sweep_task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for MemKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemKvStore")
            .field("len", &self.map.map.len())
            .finish()
    }
}

impl Drop for MemKvStore {
    fn drop(&mut self) {
        self.sweep_task.abort();
    }
}

impl MemKvStore {
    fn new(config: MemKvStoreConfig, clock: DynClock) -> Self {
        let map = Arc::new(KvMap::new(clock));
        let sweep_task = tokio::task::spawn(sweep_task(
            config.sweep_interval(),
            map.clone(),
        ));
        Self { map, sweep_task }
    }
}

async fn sweep_task(interval: std::time::Duration, map: Arc<KvMap>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = map.sweep(map.clock.now());
        if removed > 0 {
            tracing::trace!(removed, "swept expired kv entries");
        }
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &str) -> BoxFut<'_, RvResult<Option<bytes::Bytes>>> {
        let r = self.map.get(key);
        Box::pin(async move { Ok(r) })
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: bytes::Bytes,
        ttl: std::time::Duration,
    ) -> BoxFut<'_, RvResult<()>> {
        self.map.set(key, value, ttl);
        Box::pin(async move { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFut<'_, RvResult<()>> {
        self.map.remove(key);
        Box::pin(async move { Ok(()) })
    }

    fn list_keys(&self, prefix: &str) -> BoxFut<'_, RvResult<Vec<String>>> {
        let r = self.map.list(prefix);
        Box::pin(async move { Ok(r) })
    }
}

#[cfg(test)]
mod test;
