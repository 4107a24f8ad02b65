use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::HOST;
use hyper::{Body, Client, Request};
use hyper_tls::HttpsConnector;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PluginError, Result};
use crate::url_mapper::UrlMapper;
use crate::utils::is_http_scheme;

mod request;

pub use request::{FetchRequest, FetchResponse, RequestDestination};

/// 网络层抽象，对应 `fetch(request)`
///
/// 非 2xx 状态仍然返回 `Ok`，只有网络层失败才返回 `Err`。
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    mapper: UrlMapper,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(mapper: UrlMapper, timeout: Duration) -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());
        Self {
            client,
            mapper,
            timeout,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        if !is_http_scheme(&request.url) {
            return Err(PluginError::InvalidInput(format!(
                "Unsupported scheme: {}",
                request.url.scheme()
            )));
        }

        let target = self.mapper.map_url(&request.url)?;
        debug!("Fetching {} {} (upstream: {})", request.method, request.url, target);

        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(target.as_str());
        for (name, value) in request.headers.iter() {
            // Host 由 hyper 根据目标地址重新生成
            if name != HOST {
                builder = builder.header(name, value);
            }
        }
        let req = builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| PluginError::Network(e.to_string()))?;

        let resp = match tokio::time::timeout(self.timeout, self.client.request(req)).await {
            Ok(result) => result.map_err(|e| PluginError::Network(e.to_string()))?,
            Err(_) => {
                warn!("Fetch timed out after {:?}: {}", self.timeout, request.url);
                return Err(PluginError::Network(format!("Timed out: {}", request.url)));
            }
        };

        let (parts, body) = resp.into_parts();
        let body = hyper::body::to_bytes(body)
            .await
            .map_err(|e| PluginError::Network(e.to_string()))?;

        debug!("Fetched {} -> {} ({} bytes)", request.url, parts.status, body.len());
        Ok(FetchResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}
