use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{PluginError, Result};
use crate::logger::log_request;
use crate::plugins::network::{FetchRequest, FetchResponse, Fetcher, RequestDestination};
use crate::plugins::worker::{ClientMessage, Envelope, FetchOutcome, ServiceWorker};
use crate::utils::get_full_url;

struct ProxyState {
    origin: Url,
    control_path: String,
    worker: Arc<ServiceWorker>,
    network: Arc<dyn Fetcher>,
    messages: mpsc::Sender<Envelope>,
}

/// 站点前面的本地缓存代理：请求先交给 worker，未拦截的直接回源
pub struct ProxyServer {
    addr: SocketAddr,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    pub fn new(
        addr: SocketAddr,
        worker: Arc<ServiceWorker>,
        network: Arc<dyn Fetcher>,
        messages: mpsc::Sender<Envelope>,
        control_path: &str,
    ) -> Self {
        info!("Creating new proxy server on {}", addr);
        let state = ProxyState {
            origin: worker.origin().clone(),
            control_path: control_path.to_string(),
            worker,
            network,
            messages,
        };
        Self {
            addr,
            state: Arc::new(state),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// 运行直到 `shutdown` 完成
    #[tracing::instrument(skip(self, shutdown))]
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting proxy server on {}", self.addr);
        debug!("Worker messages accepted at POST {}", self.state.control_path);

        let state = self.state.clone();
        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let remote_addr = conn.remote_addr();
            debug!("New connection from: {}", remote_addr);
            let state = state.clone();

            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    debug!("Received request from {}: {} {}", remote_addr, req.method(), req.uri());
                    Self::handle_request(req, state.clone())
                }))
            }
        });

        let server = Server::try_bind(&self.addr)
            .map_err(|e| PluginError::Network(format!("Failed to bind {}: {}", self.addr, e)))?
            .serve(make_svc)
            .with_graceful_shutdown(shutdown);
        info!("Proxy server is ready to accept connections");

        if let Err(e) = server.await {
            error!("Server error: {}", e);
            return Err(PluginError::Network(e.to_string()));
        }

        info!("Proxy server stopped");
        Ok(())
    }

    async fn handle_request(
        req: Request<Body>,
        state: Arc<ProxyState>,
    ) -> std::result::Result<Response<Body>, hyper::Error> {
        let start = Instant::now();
        let path = req.uri().path().to_string();

        if req.method() == Method::POST && path == state.control_path {
            return Ok(Self::handle_message(req, &state).await);
        }

        let request = match into_fetch_request(req, &state.origin).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected request {}: {}", path, e);
                return Ok(text_response(StatusCode::BAD_REQUEST, e.to_string()));
            }
        };

        let (response, strategy) = match state.worker.handle_fetch(&request).await {
            FetchOutcome::Respond { response, strategy } => (response, Some(strategy)),
            FetchOutcome::Passthrough => match state.network.fetch(&request).await {
                Ok(response) => (response, None),
                Err(e) => {
                    error!("Passthrough failed for {}: {}", request.url, e);
                    let response = FetchResponse::new(StatusCode::BAD_GATEWAY, e.to_string())
                        .with_content_type("text/plain");
                    (response, None)
                }
            },
        };

        log_request(&path, strategy, start.elapsed());
        Ok(response.into_hyper())
    }

    /// `POST {control_path}`，请求体是 `ClientMessage` JSON
    async fn handle_message(req: Request<Body>, state: &ProxyState) -> Response<Body> {
        let body = match hyper::body::to_bytes(req.into_body()).await {
            Ok(body) => body,
            Err(e) => return text_response(StatusCode::BAD_REQUEST, e.to_string()),
        };
        let message: ClientMessage = match serde_json::from_slice(&body) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid worker message: {}", e);
                return text_response(StatusCode::BAD_REQUEST, format!("Invalid message: {}", e));
            }
        };

        let (envelope, reply) = Envelope::new(message);
        if state.messages.send(envelope).await.is_err() {
            return text_response(StatusCode::SERVICE_UNAVAILABLE, "Worker is not running".to_string());
        }
        match reply.await {
            Ok(reply) => json_response(StatusCode::OK, &reply),
            Err(_) => text_response(StatusCode::SERVICE_UNAVAILABLE, "Worker dropped the message".to_string()),
        }
    }
}

async fn into_fetch_request(req: Request<Body>, origin: &Url) -> Result<FetchRequest> {
    let (parts, body) = req.into_parts();
    let url = get_full_url(&parts.uri, origin)?;
    let body = hyper::body::to_bytes(body)
        .await
        .map_err(|e| PluginError::Network(e.to_string()))?;

    Ok(FetchRequest {
        method: parts.method,
        url,
        destination: RequestDestination::from_headers(&parts.headers),
        headers: parts.headers,
        body,
    })
}

fn text_response(status: StatusCode, body: String) -> Response<Body> {
    FetchResponse::new(status, body)
        .with_content_type("text/plain")
        .into_hyper()
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(json) => {
            let mut response = Response::new(Body::from(json));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
