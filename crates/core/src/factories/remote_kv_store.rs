//! A kv store backed by a remote shared kv server.
//!
//! Every call is an independent http round trip to a
//! `rendezvous_kv_srv` instance, so any number of server processes can
//! share presence and session state. The server enforces per-key
//! atomicity only.

use rendezvous_api::*;
use std::sync::Arc;

/// RemoteKvStore configuration types.
pub mod config {
    /// Configuration parameters for
    /// [RemoteKvStoreFactory](super::RemoteKvStoreFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct RemoteKvStoreConfig {
        /// The url of the kv server. E.g. `http://127.0.0.1:8080`.
        pub server_url: String,

        /// Per-request timeout in milliseconds. No store call may
        /// block longer than this.
        ///
        /// Default: 5s.
        pub timeout_ms: u32,
    }

    impl Default for RemoteKvStoreConfig {
        fn default() -> Self {
            Self {
                server_url: "<http://your.kv.server.url>".into(),
                timeout_ms: 1000 * 5,
            }
        }
    }

    impl RemoteKvStoreConfig {
        /// Get the request timeout.
        pub fn timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.timeout_ms as u64)
        }
    }

    /// Module-level configuration for RemoteKvStore.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct RemoteKvStoreModConfig {
        /// RemoteKvStore configuration.
        pub remote_kv_store: RemoteKvStoreConfig,
    }
}

pub use config::*;

/// Factory for a kv store that talks to a remote kv server.
#[derive(Debug)]
pub struct RemoteKvStoreFactory {}

impl RemoteKvStoreFactory {
    /// Construct a new RemoteKvStoreFactory.
    pub fn create() -> DynKvStoreFactory {
        let out: DynKvStoreFactory = Arc::new(Self {});
        out
    }
}

impl KvStoreFactory for RemoteKvStoreFactory {
    fn default_config(&self, config: &mut Config) -> RvResult<()> {
        config.set_module_config(&RemoteKvStoreModConfig::default())
    }

    fn validate_config(&self, config: &Config) -> RvResult<()> {
        let config: RemoteKvStoreModConfig = config.get_module_config()?;
        parse_server_url(&config.remote_kv_store.server_url)?;
        if config.remote_kv_store.timeout_ms == 0 {
            return Err(RvError::validation("timeoutMs must be > 0"));
        }
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, RvResult<DynKvStore>> {
        Box::pin(async move {
            let config: RemoteKvStoreModConfig =
                builder.config.get_module_config()?;
            let out: DynKvStore =
                Arc::new(RemoteKvStore::new(config.remote_kv_store)?);
            Ok(out)
        })
    }
}

fn parse_server_url(server_url: &str) -> RvResult<url::Url> {
    const ERR: &str = "invalid kv server_url";

    let url = url::Url::parse(server_url)
        .map_err(|e| RvError::validation(format!("{ERR}: {e}")))?;

    if url.cannot_be_a_base() {
        return Err(RvError::validation(ERR));
    }

    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(RvError::validation(ERR)),
    }
}

struct RemoteKvStore {
    server_url: url::Url,
    agent: ureq::Agent,
}

impl std::fmt::Debug for RemoteKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteKvStore")
            .field("server_url", &self.server_url.as_str())
            .finish()
    }
}

impl RemoteKvStore {
    fn new(config: RemoteKvStoreConfig) -> RvResult<Self> {
        let server_url = parse_server_url(&config.server_url)?;
        let agent = ureq::AgentBuilder::new().timeout(config.timeout()).build();
        Ok(Self { server_url, agent })
    }

    /// Append path segments to the server url, keeping any base path
    /// the server is mounted under.
    fn url_with(&self, segments: &[&str]) -> RvResult<String> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|_| RvError::validation("invalid kv server_url"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn key_url(
        &self,
        key: &str,
        ttl: Option<std::time::Duration>,
    ) -> RvResult<String> {
        use base64::prelude::*;

        let key = BASE64_URL_SAFE_NO_PAD.encode(key);
        match ttl {
            None => self.url_with(&["kv", &key]),
            Some(ttl) => {
                // the server rejects a zero ttl
                let ttl_ms = ttl.as_millis().max(1).to_string();
                self.url_with(&["kv", &key, &ttl_ms])
            }
        }
    }

    fn keys_url(&self, prefix: &str) -> RvResult<String> {
        use base64::prelude::*;

        if prefix.is_empty() {
            self.url_with(&["keys"])
        } else {
            self.url_with(&["keys", &BASE64_URL_SAFE_NO_PAD.encode(prefix)])
        }
    }
}

/// Run a blocking ureq call off the async executor.
async fn blocking<T, F>(f: F) -> RvResult<T>
where
    T: 'static + Send,
    F: 'static + Send + FnOnce() -> RvResult<T>,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RvError::other_src("task join error", e))?
}

impl KvStore for RemoteKvStore {
    fn get(&self, key: &str) -> BoxFut<'_, RvResult<Option<bytes::Bytes>>> {
        let url = self.key_url(key, None);
        let agent = self.agent.clone();
        Box::pin(blocking(move || {
            use std::io::Read;

            match agent.get(&url?).call() {
                Ok(res) => {
                    let mut buf = Vec::new();
                    res.into_reader()
                        .read_to_end(&mut buf)
                        .map_err(|e| RvError::store_src("kv get read", e))?;
                    Ok(Some(buf.into()))
                }
                Err(ureq::Error::Status(404, _)) => Ok(None),
                Err(err) => Err(RvError::store_src("kv get", err)),
            }
        }))
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: bytes::Bytes,
        ttl: std::time::Duration,
    ) -> BoxFut<'_, RvResult<()>> {
        let url = self.key_url(key, Some(ttl));
        let agent = self.agent.clone();
        Box::pin(blocking(move || {
            agent
                .put(&url?)
                .send_bytes(&value)
                .map_err(|e| RvError::store_src("kv set", e))?;
            Ok(())
        }))
    }

    fn remove(&self, key: &str) -> BoxFut<'_, RvResult<()>> {
        let url = self.key_url(key, None);
        let agent = self.agent.clone();
        Box::pin(blocking(move || {
            agent
                .delete(&url?)
                .call()
                .map_err(|e| RvError::store_src("kv remove", e))?;
            Ok(())
        }))
    }

    fn list_keys(&self, prefix: &str) -> BoxFut<'_, RvResult<Vec<String>>> {
        let url = self.keys_url(prefix);
        let agent = self.agent.clone();
        Box::pin(blocking(move || {
            use base64::prelude::*;

            let body = agent
                .get(&url?)
                .call()
                .map_err(|e| RvError::store_src("kv list", e))?
                .into_string()
                .map_err(|e| RvError::store_src("kv list read", e))?;
            let keys: Vec<String> = serde_json::from_str(&body)
                .map_err(|e| RvError::store_src("kv list decode", e))?;

            // keys this crate never writes (not base64, not utf8) are skipped
            Ok(keys
                .into_iter()
                .filter_map(|k| BASE64_URL_SAFE_NO_PAD.decode(k).ok())
                .filter_map(|k| String::from_utf8(k).ok())
                .collect())
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_bad_server_urls() {
        assert!(parse_server_url("<http://your.kv.server.url>")
            .unwrap_err()
            .is_validation());
        assert!(parse_server_url("not a url").unwrap_err().is_validation());
        assert!(parse_server_url("ftp://a.b").is_err());
        assert!(parse_server_url("mailto:a@b.c").is_err());
        assert!(parse_server_url("http://127.0.0.1:8080").is_ok());
    }

    fn store(server_url: &str) -> RemoteKvStore {
        RemoteKvStore::new(RemoteKvStoreConfig {
            server_url: server_url.into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn key_urls_are_base64_paths() {
        let s = store("http://127.0.0.1:8080");

        assert_eq!(
            "http://127.0.0.1:8080/kv/YTpi",
            s.key_url("a:b", None).unwrap(),
        );
        assert_eq!(
            "http://127.0.0.1:8080/kv/YTpi/1500",
            s.key_url("a:b", Some(std::time::Duration::from_millis(1500)))
                .unwrap(),
        );
        assert_eq!(
            "http://127.0.0.1:8080/kv/YTpi/1",
            s.key_url("a:b", Some(std::time::Duration::ZERO)).unwrap(),
        );
        assert_eq!(
            "http://127.0.0.1:8080/keys/YTpi",
            s.keys_url("a:b").unwrap(),
        );
        assert_eq!("http://127.0.0.1:8080/keys", s.keys_url("").unwrap());
    }

    #[test]
    fn urls_keep_the_server_base_path() {
        for base in ["http://h/rv", "http://h/rv/"] {
            let s = store(base);
            assert_eq!("http://h/rv/kv/YTpi", s.key_url("a:b", None).unwrap());
            assert_eq!(
                "http://h/rv/kv/YTpi/20",
                s.key_url("a:b", Some(std::time::Duration::from_millis(20)))
                    .unwrap(),
            );
            assert_eq!("http://h/rv/keys/YTpi", s.keys_url("a:b").unwrap());
        }
    }
}
