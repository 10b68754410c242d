//! Key-value store related types.
//!
//! The [KvStore] is the only storage dependency of the presence store and
//! the session coordinator. It is kept minimal (get, set with ttl, remove,
//! prefix listing) so that an in-process map and a remote shared store can both
//! satisfy it. Implementations give per-key atomicity only. Nothing here
//! is atomic across keys.

use crate::*;
use std::sync::Arc;

/// Represents the ability to store opaque values under string keys
/// for a bounded time.
pub trait KvStore: 'static + Send + Sync + std::fmt::Debug {
    /// Get the value at `key`. A value whose ttl has passed MUST be
    /// reported as `None`, whether or not it was physically removed yet.
    fn get(&self, key: &str) -> BoxFut<'_, RvResult<Option<bytes::Bytes>>>;

    /// Set the value at `key`, replacing any existing value, to expire
    /// `ttl` from now.
    fn set_with_ttl(
        &self,
        key: &str,
        value: bytes::Bytes,
        ttl: std::time::Duration,
    ) -> BoxFut<'_, RvResult<()>>;

    /// Remove the value at `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> BoxFut<'_, RvResult<()>>;

    /// List every live key starting with `prefix`, in no particular order.
    /// Expired keys MUST NOT be listed. Each listed key was live at some
    /// point during the call, it may be gone by the time it is read.
    fn list_keys(&self, prefix: &str) -> BoxFut<'_, RvResult<Vec<String>>>;
}

/// Trait-object [KvStore].
pub type DynKvStore = Arc<dyn KvStore>;

/// A factory for constructing [KvStore] instances.
pub trait KvStoreFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> RvResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &Config) -> RvResult<()>;

    /// Construct a kv store instance.
    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, RvResult<DynKvStore>>;
}

/// Trait-object [KvStoreFactory].
pub type DynKvStoreFactory = Arc<dyn KvStoreFactory>;

/// Encode a record for storage in a [KvStore].
pub fn encode_record<T: serde::Serialize>(t: &T) -> RvResult<bytes::Bytes> {
    serde_json::to_vec(t)
        .map(bytes::Bytes::from)
        .map_err(|e| RvError::other_src("encode record", e))
}

/// Decode a record previously stored in a [KvStore].
///
/// Returns `None` on anything that does not decode. Stored values may have
/// been written by a different version, or only partially, and readers
/// treat those the same as absent.
pub fn decode_record<T: serde::de::DeserializeOwned>(
    key: &str,
    value: &[u8],
) -> Option<T> {
    match serde_json::from_slice(value) {
        Ok(t) => Some(t),
        Err(err) => {
            tracing::debug!(%key, ?err, "ignoring undecodable record");
            None
        }
    }
}
