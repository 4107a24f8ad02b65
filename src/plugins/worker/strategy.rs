use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::plugins::cache::{CacheBucket, CacheStorage};
use crate::plugins::network::{FetchRequest, FetchResponse, Fetcher};

/// 策略执行时需要的共享资源
#[derive(Clone)]
pub(crate) struct StrategyContext {
    pub caches: Arc<CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub runtime_name: String,
    /// 为 false 时只写入已经存在的运行时缓存桶
    pub create_runtime: bool,
    pub background: Arc<BackgroundTasks>,
}

impl StrategyContext {
    async fn runtime(&self) -> Option<Arc<CacheBucket>> {
        if !self.create_runtime {
            return self.caches.get(&self.runtime_name).await;
        }
        match self.caches.open(&self.runtime_name).await {
            Ok(bucket) => Some(bucket),
            Err(e) => {
                warn!("Failed to open runtime cache {}: {}", self.runtime_name, e);
                None
            }
        }
    }
}

/// 缓存优先：命中直接返回，不做新鲜度检查
pub(crate) async fn cache_first(ctx: &StrategyContext, request: &FetchRequest) -> Result<FetchResponse> {
    let key = request.cache_key();
    if let Some(cached) = ctx.caches.match_request(&key).await {
        debug!("cache-first hit: {}", key);
        return Ok(cached);
    }

    let response = ctx.fetcher.fetch(request).await?;
    if response.is_ok() {
        if let Some(runtime) = ctx.runtime().await {
            store(&runtime, &key, &response).await;
        }
    }
    Ok(response)
}

/// 网络优先：网络失败时才读缓存
pub(crate) async fn network_first(ctx: &StrategyContext, request: &FetchRequest) -> Result<FetchResponse> {
    let key = request.cache_key();
    match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                if let Some(runtime) = ctx.runtime().await {
                    store(&runtime, &key, &response).await;
                }
            }
            Ok(response)
        }
        Err(e) => {
            warn!("network-first fetch failed for {}: {}", key, e);
            match ctx.caches.match_request(&key).await {
                Some(cached) => {
                    info!("network-first served from cache: {}", key);
                    Ok(cached)
                }
                None => Err(e),
            }
        }
    }
}

/// 先返回运行时缓存中的旧数据，同时在后台刷新
///
/// 没有缓存时等待网络结果。后台刷新可能在响应返回之后才完成。
pub(crate) async fn stale_while_revalidate(
    ctx: &StrategyContext,
    request: &FetchRequest,
) -> Result<FetchResponse> {
    let key = request.cache_key();
    let runtime = ctx.runtime().await;

    let cached = match &runtime {
        Some(bucket) => bucket.get(&key).await.unwrap_or_else(|e| {
            warn!("Runtime cache read failed for {}: {}", key, e);
            None
        }),
        None => None,
    };

    match cached {
        Some(cached) => {
            debug!("stale-while-revalidate hit, refreshing in background: {}", key);
            let fetcher = ctx.fetcher.clone();
            let request = request.clone();
            ctx.background.spawn(async move {
                match fetcher.fetch(&request).await {
                    Ok(response) if response.is_ok() => {
                        if let Some(bucket) = runtime {
                            store(&bucket, &key, &response).await;
                        }
                    }
                    Ok(response) => debug!("Revalidation of {} returned {}", key, response.status),
                    Err(e) => debug!("Revalidation of {} failed: {}", key, e),
                }
            });
            Ok(cached)
        }
        None => {
            let response = ctx.fetcher.fetch(request).await?;
            if response.is_ok() {
                if let Some(bucket) = &runtime {
                    store(bucket, &key, &response).await;
                }
            }
            Ok(response)
        }
    }
}

/// 只走网络，不读写缓存
pub(crate) async fn network_only(ctx: &StrategyContext, request: &FetchRequest) -> Result<FetchResponse> {
    ctx.fetcher.fetch(request).await
}

async fn store(bucket: &CacheBucket, key: &str, response: &FetchResponse) {
    if let Err(e) = bucket.put(key, response).await {
        warn!("Failed to cache {} in {}: {}", key, bucket.name(), e);
    }
}

/// 后台任务计数，对应 `event.waitUntil`
#[derive(Debug, Default)]
pub(crate) struct BackgroundTasks {
    in_flight: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<BackgroundTasks>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    pub fn spawn<F>(self: &Arc<Self>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(self.clone());
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}
