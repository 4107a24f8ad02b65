use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use hyper::{Body, Method, Response, StatusCode};
use url::Url;

use crate::utils::cache_key;

/// 请求目标类型，对应浏览器的 `request.destination`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDestination {
    Document,
    Image,
    Other,
}

impl RequestDestination {
    /// 优先使用 `Sec-Fetch-Dest`，否则根据 `Accept` 推断
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if let Some(dest) = headers.get("sec-fetch-dest").and_then(|v| v.to_str().ok()) {
            return match dest {
                "document" | "iframe" | "frame" => Self::Document,
                "image" => Self::Image,
                _ => Self::Other,
            };
        }

        let accept = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if accept.contains("text/html") {
            Self::Document
        } else if accept.starts_with("image/") {
            Self::Image
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub destination: RequestDestination,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            destination: RequestDestination::Other,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

/// 完整读取到内存的响应，可以直接 clone 后写入缓存
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    /// 等价于 `response.ok`
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn into_hyper(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
