use hyper::StatusCode;
use tracing::{debug, info};
use url::Url;

use crate::plugins::cache::CacheStorage;
use crate::plugins::network::{FetchResponse, RequestDestination};
use crate::utils::cache_key;

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Offline</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
      body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
        margin: 0; padding: 40px; text-align: center;
        background: linear-gradient(135deg, #ff3c00 0%, #431a00 100%);
        color: white; min-height: 100vh; display: flex;
        align-items: center; justify-content: center; flex-direction: column;
      }
      h1 { font-size: 2rem; margin-bottom: 1rem; }
      p { font-size: 1.1rem; margin-bottom: 2rem; opacity: 0.9; }
      .btn {
        background: rgba(255,255,255,0.2); border: 2px solid rgba(255,255,255,0.3);
        color: white; padding: 12px 24px; text-decoration: none; border-radius: 8px;
        font-weight: 600;
      }
    </style>
  </head>
  <body>
    <h1>You're Offline</h1>
    <p>It looks like you're not connected to the internet. Some content may not be available.</p>
    <a href="/" class="btn" onclick="window.location.reload()">Try Again</a>
  </body>
</html>
"#;

const OFFLINE_IMAGE: &str = r##"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg">
  <rect width="100%" height="100%" fill="#f0f0f0"/>
  <text x="50%" y="50%" text-anchor="middle" dy=".3em" font-family="sans-serif" font-size="16" fill="#999">
    Image not available offline
  </text>
</svg>
"##;

/// 缓存和网络都失败时的兜底响应，本身不会失败
pub async fn offline_response(
    caches: &CacheStorage,
    origin: &Url,
    destination: RequestDestination,
) -> FetchResponse {
    match destination {
        RequestDestination::Document => {
            // 优先返回缓存的首页
            let root = origin.join("/").map(|u| cache_key(&u)).unwrap_or_default();
            if let Some(cached) = caches.match_request(&root).await {
                info!("Serving cached root page as offline fallback");
                return cached;
            }
            info!("Serving generated offline page");
            offline_page()
        }
        RequestDestination::Image => {
            debug!("Serving offline image placeholder");
            offline_image()
        }
        RequestDestination::Other => network_error(),
    }
}

pub fn offline_page() -> FetchResponse {
    FetchResponse::new(StatusCode::OK, OFFLINE_PAGE).with_content_type("text/html")
}

pub fn offline_image() -> FetchResponse {
    FetchResponse::new(StatusCode::OK, OFFLINE_IMAGE).with_content_type("image/svg+xml")
}

pub fn network_error() -> FetchResponse {
    FetchResponse::new(StatusCode::REQUEST_TIMEOUT, "Network error").with_content_type("text/plain")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://savoie.app").unwrap()
    }

    #[tokio::test]
    async fn test_document_prefers_cached_root() {
        let caches = CacheStorage::in_memory();
        let bucket = caches.open("precache").await.unwrap();
        let root = FetchResponse::new(StatusCode::OK, "<h1>home</h1>").with_content_type("text/html");
        bucket.put("https://savoie.app/", &root).await.unwrap();

        let resp = offline_response(&caches, &origin(), RequestDestination::Document).await;
        assert_eq!(resp, root);
    }

    #[tokio::test]
    async fn test_document_without_cache_gets_offline_page() {
        let caches = CacheStorage::in_memory();
        let resp = offline_response(&caches, &origin(), RequestDestination::Document).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.content_type(), Some("text/html"));
        assert!(String::from_utf8_lossy(&resp.body).contains("You're Offline"));
    }

    #[tokio::test]
    async fn test_image_and_other_fallbacks() {
        let caches = CacheStorage::in_memory();

        let image = offline_response(&caches, &origin(), RequestDestination::Image).await;
        assert_eq!(image.content_type(), Some("image/svg+xml"));
        assert!(image.body.starts_with(b"<svg"));

        let other = offline_response(&caches, &origin(), RequestDestination::Other).await;
        assert_eq!(other.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(&other.body[..], b"Network error");
    }
}
