use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use hyper::Method;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::WorkerConfig;
use crate::error::{PluginError, Result};
use crate::plugin::{Plugin, PluginHealth};
use crate::plugins::cache::CacheStorage;
use crate::plugins::network::{FetchRequest, FetchResponse, Fetcher};
use crate::utils::is_http_scheme;

mod fallback;
mod message;
mod routing;
mod strategy;

pub use fallback::{network_error, offline_image, offline_page, offline_response};
pub use message::{ClientMessage, Envelope, MessageReply};
pub use routing::{Matcher, RouteTable, Rule, Strategy};

use strategy::{BackgroundTasks, StrategyContext};

/// worker 生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// 安装完成，等待激活
    Installed,
    Activating,
    Activated,
    /// 安装失败，旧版本继续生效
    Redundant,
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// 不拦截，交给默认网络处理
    Passthrough,
    Respond {
        response: FetchResponse,
        strategy: Strategy,
    },
}

/// 请求路由 + 缓存生命周期，相当于站点的 service worker
pub struct ServiceWorker {
    config: WorkerConfig,
    origin: Url,
    routes: RouteTable,
    ctx: StrategyContext,
    state: RwLock<WorkerState>,
    lifecycle: Mutex<()>,
    clients_claimed: AtomicBool,
}

impl ServiceWorker {
    pub fn new(config: WorkerConfig, caches: Arc<CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| PluginError::Config(format!("worker.origin: {}", e)))?;
        info!("Creating service worker {} for {}", config.version, origin);

        let ctx = StrategyContext {
            caches,
            fetcher,
            runtime_name: config.runtime_name(),
            create_runtime: true,
            background: Arc::new(BackgroundTasks::default()),
        };

        Ok(Self {
            config,
            origin,
            routes: RouteTable::default(),
            ctx,
            state: RwLock::new(WorkerState::Parsed),
            lifecycle: Mutex::new(()),
            clients_claimed: AtomicBool::new(false),
        })
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn precache_name(&self) -> String {
        self.config.precache_name()
    }

    pub fn runtime_name(&self) -> String {
        self.config.runtime_name()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    pub fn classify(&self, url: &Url) -> Strategy {
        self.routes.classify(url)
    }

    async fn set_state(&self, state: WorkerState) {
        debug!("Worker state -> {:?}", state);
        *self.state.write().await = state;
    }

    /// 预缓存所有资源，全部成功才写入版本化缓存桶
    #[tracing::instrument(skip(self), fields(version = %self.config.version))]
    pub async fn install(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        match self.state().await {
            WorkerState::Parsed | WorkerState::Redundant => {}
            other => {
                return Err(PluginError::Plugin(format!("Cannot install from state {:?}", other)));
            }
        }
        self.set_state(WorkerState::Installing).await;

        // 同一版本的预缓存已经完整落盘，重启时不再访问网络
        if self.precache_complete().await {
            info!("Reusing existing precache {}", self.precache_name());
            self.set_state(WorkerState::Installed).await;
            return Ok(());
        }
        info!("Installing: precaching {} assets", self.config.precache.len());

        match self.precache().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed).await;
                info!("Install complete, {} assets precached", count);
                Ok(())
            }
            Err(e) => {
                error!("Install failed: {}", e);
                self.set_state(WorkerState::Redundant).await;
                Err(PluginError::Install(e.to_string()))
            }
        }
    }

    fn precache_requests(&self) -> Result<Vec<FetchRequest>> {
        self.config
            .precache
            .iter()
            .map(|path| {
                self.origin
                    .join(path)
                    .map(FetchRequest::get)
                    .map_err(|e| PluginError::InvalidInput(format!("{}: {}", path, e)))
            })
            .collect()
    }

    async fn precache_complete(&self) -> bool {
        let Some(bucket) = self.ctx.caches.get(&self.precache_name()).await else {
            return false;
        };
        let Ok(requests) = self.precache_requests() else {
            return false;
        };
        for request in &requests {
            if !bucket.contains(&request.cache_key()).await {
                return false;
            }
        }
        true
    }

    async fn precache(&self) -> Result<usize> {
        let requests = self.precache_requests()?;

        // 先全部下载到内存，任何一个失败都不落盘
        let fetcher = &self.ctx.fetcher;
        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = fetcher.fetch(request).await?;
            if !response.is_ok() {
                return Err(PluginError::Network(format!(
                    "{} returned {}",
                    request.url, response.status
                )));
            }
            Ok::<_, PluginError>((request.cache_key(), response))
        }))
        .await?;

        let name = self.precache_name();
        let bucket = self.ctx.caches.open(&name).await?;
        let writes = try_join_all(responses.iter().map(|(key, response)| bucket.put(key, response))).await;
        if let Err(e) = writes {
            warn!("Precache write failed, discarding {}", name);
            if let Err(cleanup) = self.ctx.caches.delete(&name).await {
                warn!("Failed to discard partial precache {}: {}", name, cleanup);
            }
            return Err(e);
        }

        Ok(responses.len())
    }

    /// 删除所有不属于当前版本的缓存桶，然后接管页面
    ///
    /// 返回被删除的缓存桶名称。
    #[tracing::instrument(skip(self), fields(version = %self.config.version))]
    pub async fn activate(&self) -> Result<Vec<String>> {
        let _lifecycle = self.lifecycle.lock().await;
        match self.state().await {
            WorkerState::Installed => {}
            WorkerState::Activated => return Ok(Vec::new()),
            other => {
                return Err(PluginError::Plugin(format!("Cannot activate from state {:?}", other)));
            }
        }
        self.set_state(WorkerState::Activating).await;

        let keep = [self.precache_name(), self.runtime_name()];
        let stale: Vec<String> = self
            .ctx
            .caches
            .keys()
            .await
            .into_iter()
            .filter(|name| !keep.contains(name))
            .collect();

        let results = join_all(stale.iter().map(|name| self.ctx.caches.delete(name))).await;
        let mut deleted = Vec::new();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    info!("Deleted old cache: {}", name);
                    deleted.push(name);
                }
                Err(e) => warn!("Failed to delete old cache {}: {}", name, e),
            }
        }

        self.ctx.caches.open(&self.runtime_name()).await?;
        self.set_state(WorkerState::Activated).await;
        self.clients_claimed.store(true, Ordering::SeqCst);
        info!("Activated, {} old caches removed", deleted.len());
        Ok(deleted)
    }

    /// 等待中的 worker 立即激活；其他状态下不做任何事
    pub async fn skip_waiting(&self) -> Result<bool> {
        if self.state().await != WorkerState::Installed {
            debug!("skip_waiting ignored, worker is not waiting");
            return Ok(false);
        }
        self.activate().await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    pub async fn handle_fetch(&self, request: &FetchRequest) -> FetchOutcome {
        if request.method != Method::GET || !is_http_scheme(&request.url) {
            return FetchOutcome::Passthrough;
        }
        let ctx = match self.state().await {
            WorkerState::Activated => self.ctx.clone(),
            // 正在删除旧缓存桶
            WorkerState::Activating => return FetchOutcome::Passthrough,
            _ => match self.previous_controller().await {
                Some(ctx) => {
                    debug!("Serving with previous version ({})", ctx.runtime_name);
                    ctx
                }
                None => {
                    debug!("Worker not active, passing through");
                    return FetchOutcome::Passthrough;
                }
            },
        };

        let strategy = self.classify(&request.url);
        debug!("Strategy {} for {}", strategy, request.url);

        let result = match strategy {
            Strategy::CacheFirst => strategy::cache_first(&ctx, request).await,
            Strategy::NetworkFirst => strategy::network_first(&ctx, request).await,
            Strategy::StaleWhileRevalidate => strategy::stale_while_revalidate(&ctx, request).await,
            Strategy::NetworkOnly => strategy::network_only(&ctx, request).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!("Request failed: {} ({})", request.url, e);
                offline_response(&self.ctx.caches, &self.origin, request.destination).await
            }
        };
        FetchOutcome::Respond { response, strategy }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> MessageReply {
        debug!("Received client message: {:?}", message);
        match message {
            ClientMessage::SkipWaiting => {
                let ok = match self.skip_waiting().await {
                    Ok(activated) => activated,
                    Err(e) => {
                        warn!("skip_waiting failed: {}", e);
                        false
                    }
                };
                MessageReply::Ack { ok }
            }
            ClientMessage::GetCacheInfo => MessageReply::CacheInfo(self.ctx.caches.info().await),
        }
    }

    /// 启动消息循环，所有发送端关闭后自动退出
    pub fn spawn_message_loop(self: &Arc<Self>) -> mpsc::Sender<Envelope> {
        let (tx, mut rx) = mpsc::channel::<Envelope>(32);
        let worker = self.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let reply = worker.handle_message(envelope.message).await;
                if let Some(tx) = envelope.reply {
                    if tx.send(reply).is_err() {
                        debug!("Message reply dropped, client went away");
                    }
                }
            }
            debug!("Message loop stopped");
        });
        tx
    }

    /// 当前版本未激活时，由上一个已激活版本的缓存桶继续响应
    ///
    /// 运行时缓存桶只在激活时创建，存在即说明对应版本曾经激活过；取最后创建的那个。
    async fn previous_controller(&self) -> Option<StrategyContext> {
        let prefix = format!("{}-runtime-", self.config.cache_prefix);
        let current = self.runtime_name();
        let runtime_name = self
            .ctx
            .caches
            .keys()
            .await
            .into_iter()
            .filter(|name| name.starts_with(&prefix) && *name != current)
            .last()?;

        Some(StrategyContext {
            runtime_name,
            create_runtime: false,
            ..self.ctx.clone()
        })
    }

    pub fn pending_revalidations(&self) -> usize {
        self.ctx.background.in_flight()
    }

    /// 等待所有后台刷新完成
    pub async fn wait_until_idle(&self) {
        self.ctx.background.wait_idle().await;
    }
}

/// 页面侧经过 worker 的 fetch；不拦截的请求直接走网络
#[async_trait]
impl Fetcher for ServiceWorker {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        match self.handle_fetch(request).await {
            FetchOutcome::Respond { response, .. } => Ok(response),
            FetchOutcome::Passthrough => self.ctx.fetcher.fetch(request).await,
        }
    }
}

#[async_trait]
impl Plugin for ServiceWorker {
    fn name(&self) -> &str {
        "service-worker"
    }

    fn version(&self) -> &str {
        &self.config.version
    }

    async fn init(&self) -> Result<()> {
        self.install().await?;
        if self.config.skip_waiting {
            self.skip_waiting().await?;
        } else {
            info!("Worker installed and waiting for SKIP_WAITING");
        }
        Ok(())
    }

    async fn drain(&self, timeout: Duration) -> usize {
        info!("Waiting for {} background revalidations", self.pending_revalidations());
        match tokio::time::timeout(timeout, self.wait_until_idle()).await {
            Ok(()) => 0,
            Err(_) => self.pending_revalidations(),
        }
    }

    async fn health(&self) -> PluginHealth {
        PluginHealth {
            version: self.config.version.clone(),
            state: self.state().await,
            pending_tasks: self.pending_revalidations(),
        }
    }
}
