// 标准库导入
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// 第三方库导入
use async_trait::async_trait;
use hyper::StatusCode;
use tracing::{info, warn};
use url::Url;

// 项目导入
use site_cache::config::WorkerConfig;
use site_cache::logger::init_logger;
use site_cache::plugins::network::RequestDestination;
use site_cache::plugins::FetchOutcome;
use site_cache::prelude::*;
use site_cache::Result;

/// 模拟站点，可以随时断网
struct DemoSite {
    pages: HashMap<&'static str, &'static str>,
    online: AtomicBool,
}

#[async_trait]
impl Fetcher for DemoSite {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(site_cache::PluginError::Network("connection refused".into()));
        }
        Ok(match self.pages.get(request.url.as_str()) {
            Some(body) => FetchResponse::new(StatusCode::OK, *body),
            None => FetchResponse::new(StatusCode::NOT_FOUND, "not found"),
        })
    }
}

async fn show(worker: &ServiceWorker, request: FetchRequest) {
    match worker.handle_fetch(&request).await {
        FetchOutcome::Respond { response, strategy } => info!(
            "{:<50} {:<24} {} {:?}",
            request.url.as_str(),
            strategy.as_str(),
            response.status,
            String::from_utf8_lossy(&response.body).lines().next().unwrap_or("")
        ),
        FetchOutcome::Passthrough => info!("{:<50} passthrough", request.url.as_str()),
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logger();

    let site = Arc::new(DemoSite {
        pages: HashMap::from([
            ("https://savoie.app/", "<h1>Home</h1>"),
            ("https://savoie.app/assets/css/main.css", "body {}"),
            ("https://savoie.app/api/apps", "[\"ruler\"]"),
            ("https://savoie.app/assets/images/hero.webp", "WEBP"),
        ]),
        online: AtomicBool::new(true),
    });

    let config = WorkerConfig {
        origin: "https://savoie.app".to_string(),
        version: "demo".to_string(),
        precache: vec!["/".to_string(), "/assets/css/main.css".to_string()],
        ..WorkerConfig::default()
    };
    let worker = Arc::new(ServiceWorker::new(config, Arc::new(CacheStorage::in_memory()), site.clone())?);
    worker.init().await?;

    let url = |path: &str| Url::parse("https://savoie.app").and_then(|base| base.join(path));

    info!("--- online ---");
    for path in ["/", "/assets/css/main.css", "/api/apps", "/assets/images/hero.webp"] {
        show(&worker, FetchRequest::get(url(path)?)).await;
    }

    warn!("--- network down ---");
    site.online.store(false, Ordering::SeqCst);
    show(&worker, FetchRequest::get(url("/api/apps")?)).await;
    show(&worker, FetchRequest::get(url("/assets/images/hero.webp")?)).await;
    show(
        &worker,
        FetchRequest::get(url("/apps/unknown/")?).with_destination(RequestDestination::Document),
    )
    .await;
    show(
        &worker,
        FetchRequest::get(url("/assets/images/missing.png")?).with_destination(RequestDestination::Image),
    )
    .await;
    show(&worker, FetchRequest::get(url("/api/track")?)).await;

    let tx = worker.spawn_message_loop();
    let (envelope, reply) = Envelope::new(ClientMessage::GetCacheInfo);
    tx.send(envelope).await?;
    info!("Cache info: {}", serde_json::to_string(&reply.await?)?);

    worker.drain(Duration::from_secs(5)).await;
    Ok(())
}
