//! kv http server types.

use std::sync::Arc;

use crate::*;

/// Print out a message if this thread dies.
struct ThreadGuard(&'static str);

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        tracing::debug!("{}", self.0);
    }
}

/// An actual rendezvous_kv_srv server instance.
///
/// The http front end runs on its own tokio runtime, handing requests
/// to a pool of os thread workers that own all access to the map.
pub struct KvSrv {
    cont: Arc<std::sync::atomic::AtomicBool>,
    workers: Vec<std::thread::JoinHandle<std::io::Result<()>>>,
    addrs: Vec<std::net::SocketAddr>,
    server: Option<Server>,
}

impl Drop for KvSrv {
    fn drop(&mut self) {
        let _g = ThreadGuard("Server Shutdown Complete!");

        tracing::debug!("begin server shutdown...");
        let _ = self.shutdown();
    }
}

impl KvSrv {
    /// Construct a new KvSrv instance.
    pub fn new(config: Config) -> std::io::Result<Self> {
        let config = Arc::new(config);

        // atomic flag for telling worker threads to shutdown
        let cont = Arc::new(std::sync::atomic::AtomicBool::new(true));

        let map = KvMap::default();

        // start the actual http server
        let server = Server::new(config.clone())?;

        // get the address that was assigned
        let addrs = server.server_addrs().to_vec();
        tracing::info!(?addrs, "Listening");

        // spawn our worker threads
        let mut workers = Vec::with_capacity(config.worker_thread_count + 1);
        for _ in 0..config.worker_thread_count {
            let config = config.clone();
            let cont = cont.clone();
            let recv = server.receiver().clone();
            let map = map.clone();
            workers.push(std::thread::spawn(move || {
                worker(config, cont, recv, map)
            }));
        }

        // also set up a worker for pruning expired values
        let prune_cont = cont.clone();
        workers.push(std::thread::spawn(move || {
            prune_worker(config, prune_cont, map)
        }));

        Ok(Self {
            cont,
            workers,
            addrs,
            server: Some(server),
        })
    }

    /// Shutdown the server, returning an error result if any
    /// of the worker threads had panicked.
    pub fn shutdown(&mut self) -> std::io::Result<()> {
        let mut is_err = false;
        self.cont.store(false, std::sync::atomic::Ordering::SeqCst);
        drop(self.server.take());
        while let Some(worker) = self.workers.pop() {
            tracing::debug!(
                "waiting on {} threads to close...",
                self.workers.len() + 1
            );
            if worker.join().is_err() {
                is_err = true;
            }
        }
        tracing::debug!("all threads closed.");
        if is_err {
            Err(std::io::Error::other("Failure shutting down worker thread"))
        } else {
            Ok(())
        }
    }

    /// Get the bound listening addresses of this server.
    pub fn listen_addrs(&self) -> &[std::net::SocketAddr] {
        self.addrs.as_slice()
    }

    /// Get the first bound listening address of this server.
    pub fn listen_addr(&self) -> std::net::SocketAddr {
        self.addrs
            .first()
            .copied()
            .unwrap_or_else(|| ([0, 0, 0, 0], 0).into())
    }

    /// Print the address server started on
    pub fn print_addrs(&self) {
        println!("#rendezvous_kv_srv#running#");
        for addr in self.addrs.iter() {
            // print these incase someone wants to parse for them
            println!("#rendezvous_kv_srv#listening#{addr:?}#");
        }
    }
}

fn prune_worker(
    config: Arc<Config>,
    cont: Arc<std::sync::atomic::AtomicBool>,
    map: KvMap,
) -> std::io::Result<()> {
    let _g = ThreadGuard("prune_worker thread has ended");

    let mut last_check = std::time::Instant::now();

    while cont.load(std::sync::atomic::Ordering::SeqCst) {
        std::thread::sleep(config.request_listen_duration);

        if last_check.elapsed() >= config.prune_interval {
            last_check = std::time::Instant::now();

            let pruned = map.prune(crate::now());
            if pruned > 0 {
                tracing::debug!(pruned, "pruned expired values");
            }
        }
    }

    Ok(())
}

fn worker(
    config: Arc<Config>,
    cont: Arc<std::sync::atomic::AtomicBool>,
    recv: HttpReceiver,
    map: KvMap,
) -> std::io::Result<()> {
    let _g = ThreadGuard("worker thread has ended");

    while cont.load(std::sync::atomic::Ordering::SeqCst) {
        let (req, res) = match recv.recv() {
            None => break,
            Some(r) => r,
        };

        let handler = Handler {
            config: &config,
            map: &map,
            res,
        };

        handler.handle(req);
    }

    Ok(())
}

struct Handler<'lt> {
    config: &'lt Config,
    map: &'lt KvMap,
    res: HttpRespondCb,
}

impl Handler<'_> {
    /// Dispatch to the correct handlers and respond.
    pub fn handle(self, req: HttpRequest) {
        let res = match req {
            HttpRequest::HealthGet => HttpResponse::json(200, b"{}".to_vec()),
            HttpRequest::KvGet { key } => self.handle_get(key),
            HttpRequest::KvPut { key, ttl_ms, body } => {
                self.handle_put(key, ttl_ms, body)
            }
            HttpRequest::KvDelete { key } => {
                self.map.remove(&key);
                HttpResponse::json(200, b"{}".to_vec())
            }
            HttpRequest::KeysList { prefix } => self.handle_list(prefix),
        };
        self.respond(res);
    }

    fn handle_get(&self, key: bytes::Bytes) -> HttpResponse {
        match self.map.get(&key, crate::now()) {
            Some(value) => HttpResponse {
                status: 200,
                content_type: "application/octet-stream",
                body: value.to_vec(),
            },
            None => HttpResponse::error(404, "NotFound"),
        }
    }

    fn handle_list(&self, prefix: bytes::Bytes) -> HttpResponse {
        use base64::prelude::*;

        let keys = self
            .map
            .list(&prefix, crate::now())
            .iter()
            .map(|k| BASE64_URL_SAFE_NO_PAD.encode(k))
            .collect::<Vec<_>>();

        match serde_json::to_vec(&keys) {
            Ok(body) => HttpResponse::json(200, body),
            Err(_) => HttpResponse::error(500, "EncodeError"),
        }
    }

    fn handle_put(
        &self,
        key: bytes::Bytes,
        ttl_ms: u64,
        body: bytes::Bytes,
    ) -> HttpResponse {
        let ttl = std::time::Duration::from_millis(ttl_ms);
        if ttl.is_zero() || ttl > self.config.max_ttl {
            return HttpResponse::error(400, "InvalidTtl");
        }

        // the body limit layer already enforces this for http requests
        if body.len() > self.config.max_value_bytes {
            return HttpResponse::error(413, "ValueTooLarge");
        }

        let expires_at = crate::now() + ttl.as_micros() as i64;
        self.map.put(key, body, expires_at);

        HttpResponse::json(200, b"{}".to_vec())
    }

    /// Process the response.
    fn respond(self, res: HttpResponse) {
        let Self { res: cb, .. } = self;
        cb(res);
    }
}
