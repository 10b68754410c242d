//! config types.

/// Configuration for running a KvSrv.
#[derive(Debug)]
pub struct Config {
    /// Worker thread count.
    ///
    /// Requests are handled by os thread workers pulling from a shared
    /// queue. Work per request is a single map operation, so this mostly
    /// bounds how many requests are in flight at once.
    ///
    /// Defaults:
    /// - `testing = 2`
    /// - `production = 4 * cpu_count`
    pub worker_thread_count: usize,

    /// The largest value a put may carry, in bytes.
    ///
    /// Defaults:
    /// - `testing = 64KiB`
    /// - `production = 64KiB`
    pub max_value_bytes: usize,

    /// The longest ttl a put may ask for.
    ///
    /// Defaults:
    /// - `testing = 7 days`
    /// - `production = 7 days`
    pub max_ttl: std::time::Duration,

    /// How long the prune worker sleeps between checks for shutdown.
    ///
    /// Setting this very high will cause ctrl-c / server shutdown to be slow.
    /// Setting this very low will increase cpu overhead.
    ///
    /// Defaults:
    /// - `testing = 10ms`
    /// - `production = 2s`
    pub request_listen_duration: std::time::Duration,

    /// The address(es) at which to listen.
    ///
    /// Defaults:
    /// - `testing = "[127.0.0.1:0]"`
    /// - `production = "[0.0.0.0:8470]"`
    pub listen_address_list: Vec<std::net::SocketAddr>,

    /// The interval at which expired values are pruned from memory.
    ///
    /// This walks the whole map under its lock.
    ///
    /// Defaults:
    /// - `testing = 10s`
    /// - `production = 60s`
    pub prune_interval: std::time::Duration,
}

impl Config {
    /// Get a kv_srv config suitable for testing.
    pub fn testing() -> Self {
        Self {
            worker_thread_count: 2,
            max_value_bytes: 64 * 1024,
            max_ttl: std::time::Duration::from_secs(60 * 60 * 24 * 7),
            request_listen_duration: std::time::Duration::from_millis(10),
            listen_address_list: vec![
                (std::net::Ipv4Addr::LOCALHOST, 0).into()
            ],
            prune_interval: std::time::Duration::from_secs(10),
        }
    }

    /// Get a kv_srv config suitable for production.
    pub fn production() -> Self {
        Self {
            worker_thread_count: num_cpus::get() * 4,
            max_value_bytes: 64 * 1024,
            max_ttl: std::time::Duration::from_secs(60 * 60 * 24 * 7),
            request_listen_duration: std::time::Duration::from_secs(2),
            listen_address_list: vec![
                (std::net::Ipv4Addr::UNSPECIFIED, 8470).into(),
            ],
            prune_interval: std::time::Duration::from_secs(60),
        }
    }
}
