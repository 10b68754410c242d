use crate::Config;
use axum::*;
use std::sync::Arc;

pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn error(status: u16, error: &str) -> Self {
        Self::json(
            status,
            serde_json::json!({ "error": error }).to_string().into_bytes(),
        )
    }

    fn respond(self) -> response::Response {
        response::Response::builder()
            .status(self.status)
            .header("Content-Type", self.content_type)
            .body(body::Body::from(self.body))
            .unwrap_or_else(|_| {
                let mut res = response::Response::new(body::Body::empty());
                *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                res
            })
    }
}

pub type HttpRespondCb = Box<dyn FnOnce(HttpResponse) + 'static + Send>;

pub enum HttpRequest {
    HealthGet,
    KvGet {
        key: bytes::Bytes,
    },
    KvPut {
        key: bytes::Bytes,
        ttl_ms: u64,
        body: bytes::Bytes,
    },
    KvDelete {
        key: bytes::Bytes,
    },
    KeysList {
        prefix: bytes::Bytes,
    },
}

type HSend = async_channel::Sender<(HttpRequest, HttpRespondCb)>;
type HRecv = async_channel::Receiver<(HttpRequest, HttpRespondCb)>;

#[derive(Clone)]
pub struct HttpReceiver(HRecv);

impl HttpReceiver {
    pub fn recv(&self) -> Option<(HttpRequest, HttpRespondCb)> {
        match self.0.recv_blocking() {
            Ok(r) => Some(r),
            Err(_) => None,
        }
    }
}

pub struct Server {
    t_join: Option<std::thread::JoinHandle<()>>,
    addrs: Vec<std::net::SocketAddr>,
    receiver: HttpReceiver,
    h_send: HSend,
    shutdown: Option<axum_server::Handle>,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.h_send.close();
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.shutdown();
        }
        if let Some(t_join) = self.t_join.take() {
            let _ = t_join.join();
        }
    }
}

impl Server {
    pub fn new(config: Arc<Config>) -> std::io::Result<Self> {
        let (s_ready, r_ready) = tokio::sync::oneshot::channel();
        let t_join = std::thread::spawn(move || tokio_thread(config, s_ready));
        match r_ready.blocking_recv() {
            Ok(Ok(Ready {
                h_send,
                addrs,
                receiver,
                shutdown,
            })) => Ok(Self {
                t_join: Some(t_join),
                addrs,
                receiver,
                h_send,
                shutdown: Some(shutdown),
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(std::io::Error::other("failed to bind server")),
        }
    }

    pub fn server_addrs(&self) -> &[std::net::SocketAddr] {
        self.addrs.as_slice()
    }

    pub fn receiver(&self) -> &HttpReceiver {
        &self.receiver
    }
}

struct Ready {
    h_send: HSend,
    addrs: Vec<std::net::SocketAddr>,
    receiver: HttpReceiver,
    shutdown: axum_server::Handle,
}

type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

fn tokio_thread(
    config: Arc<Config>,
    ready: tokio::sync::oneshot::Sender<std::io::Result<Ready>>,
) {
    tracing::trace!(?config, "Starting tokio thread");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    runtime.block_on(async move {
        let (h_send, h_recv) =
            async_channel::bounded(config.worker_thread_count);

        let app: Router = Router::<HSend>::new()
            .route("/health", routing::get(handle_health_get))
            .route(
                "/kv/:key",
                routing::get(handle_kv_get).delete(handle_kv_delete),
            )
            .route("/kv/:key/:ttl_ms", routing::put(handle_kv_put))
            .route("/keys", routing::get(handle_keys_list_all))
            .route("/keys/:prefix", routing::get(handle_keys_list))
            .layer(extract::DefaultBodyLimit::max(config.max_value_bytes))
            .with_state(h_send.clone());

        let receiver = HttpReceiver(h_recv);

        let mut addrs = Vec::with_capacity(config.listen_address_list.len());
        let mut servers: Vec<BoxFut<'static, std::io::Result<()>>> =
            Vec::with_capacity(config.listen_address_list.len());

        let shutdown_handle = axum_server::Handle::new();

        for addr in config.listen_address_list.iter().copied() {
            tracing::info!("Binding to: {}", addr);

            let listener = match tokio::task::spawn_blocking(move || {
                std::net::TcpListener::bind(addr)
            })
            .await
            {
                Ok(Ok(listener)) => listener,
                Ok(Err(err)) => {
                    let _ = ready.send(Err(err));
                    return;
                }
                Err(err) => {
                    let _ = ready.send(Err(std::io::Error::other(err)));
                    return;
                }
            };

            match listener.local_addr() {
                Ok(addr) => {
                    tracing::info!("Bound with local address: {}", addr);
                    addrs.push(addr)
                }
                Err(err) => {
                    let _ = ready.send(Err(err));
                    return;
                }
            }

            let s = std::future::IntoFuture::into_future(
                axum_server::Server::from_tcp(listener)
                    .handle(shutdown_handle.clone())
                    .serve(app.clone().into_make_service()),
            );
            servers.push(Box::pin(s));
        }

        tracing::info!("Sending ready signal");

        if ready
            .send(Ok(Ready {
                h_send,
                addrs,
                receiver,
                shutdown: shutdown_handle,
            }))
            .is_err()
        {
            return;
        }

        let _ = futures::future::join_all(servers).await;
    });
}

async fn handle_dispatch(
    h_send: &HSend,
    req: HttpRequest,
) -> response::Response {
    let (s, r) = tokio::sync::oneshot::channel();
    let s = Box::new(move |res| {
        let _ = s.send(res);
    });
    tokio::time::timeout(std::time::Duration::from_secs(10), async move {
        let _ = h_send.send((req, s)).await;
        match r.await {
            Ok(r) => r.respond(),
            Err(_) => HttpResponse::error(500, "request dropped").respond(),
        }
    })
    .await
    .unwrap_or_else(|_| HttpResponse::error(500, "internal timeout").respond())
}

async fn handle_health_get(
    extract::State(h_send): extract::State<HSend>,
) -> response::Response {
    handle_dispatch(&h_send, HttpRequest::HealthGet).await
}

async fn handle_kv_get(
    extract::Path(key): extract::Path<String>,
    extract::State(h_send): extract::State<HSend>,
) -> response::Response {
    let key = match b64_to_bytes(&key) {
        Ok(key) => key,
        Err(err) => return err,
    };
    handle_dispatch(&h_send, HttpRequest::KvGet { key }).await
}

async fn handle_kv_delete(
    extract::Path(key): extract::Path<String>,
    extract::State(h_send): extract::State<HSend>,
) -> response::Response {
    let key = match b64_to_bytes(&key) {
        Ok(key) => key,
        Err(err) => return err,
    };
    handle_dispatch(&h_send, HttpRequest::KvDelete { key }).await
}

async fn handle_kv_put(
    extract::Path((key, ttl_ms)): extract::Path<(String, u64)>,
    extract::State(h_send): extract::State<HSend>,
    body: bytes::Bytes,
) -> response::Response<body::Body> {
    let key = match b64_to_bytes(&key) {
        Ok(key) => key,
        Err(err) => return err,
    };
    handle_dispatch(&h_send, HttpRequest::KvPut { key, ttl_ms, body }).await
}

async fn handle_keys_list_all(
    extract::State(h_send): extract::State<HSend>,
) -> response::Response {
    let prefix = bytes::Bytes::new();
    handle_dispatch(&h_send, HttpRequest::KeysList { prefix }).await
}

async fn handle_keys_list(
    extract::Path(prefix): extract::Path<String>,
    extract::State(h_send): extract::State<HSend>,
) -> response::Response {
    let prefix = match b64_to_bytes(&prefix) {
        Ok(prefix) => prefix,
        Err(err) => return err,
    };
    handle_dispatch(&h_send, HttpRequest::KeysList { prefix }).await
}

fn b64_to_bytes(
    s: &str,
) -> Result<bytes::Bytes, response::Response<body::Body>> {
    use base64::prelude::*;
    match BASE64_URL_SAFE_NO_PAD.decode(s) {
        Ok(b) => Ok(b.into()),
        Err(_) => Err(HttpResponse::error(400, "InvalidKey").respond()),
    }
}
