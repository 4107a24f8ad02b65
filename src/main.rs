use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use site_cache::logger::init_logger;
use site_cache::prelude::*;
use site_cache::{Config, PluginManager};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    init_logger();

    info!("Starting site cache proxy");

    let config = Config::load()?;

    // 创建插件管理器
    let plugin_manager = Arc::new(PluginManager::new(Duration::from_secs(
        config.server.shutdown_timeout_secs,
    )));

    let caches = Arc::new(match &config.worker.cache_dir {
        Some(dir) => CacheStorage::persistent(dir).await?,
        None => CacheStorage::in_memory(),
    });

    // 对外 origin 映射到真实回源地址
    let mapper = UrlMapper::new().with_rule(&config.worker.origin, &config.server.upstream);
    let network: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
        mapper,
        Duration::from_secs(config.server.fetch_timeout_secs),
    ));

    let worker = Arc::new(ServiceWorker::new(
        config.worker.clone(),
        caches,
        network.clone(),
    )?);

    // 安装失败时旧版本的缓存桶继续响应
    if let Err(e) = plugin_manager.register_plugin(worker.clone()).await {
        error!("Failed to register plugin: {}", e);
    }

    let messages = worker.spawn_message_loop();

    // 启动健康检查
    start_health_check(plugin_manager.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let proxy = ProxyServer::new(addr, worker, network, messages, &config.server.control_path);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        proxy
            .run(async {
                let _ = stop_rx.await;
            })
            .await
    });

    // 等待关闭信号
    wait_for_shutdown().await;

    // 优雅关闭
    info!("Shutting down...");
    let _ = stop_tx.send(());
    match server.await {
        Ok(Err(e)) => error!("Proxy server error: {}", e),
        Err(e) => error!("Proxy server task failed: {}", e),
        Ok(Ok(())) => {}
    }
    let abandoned: usize = plugin_manager.shutdown().await.values().sum();
    info!("Shutdown complete ({} background tasks abandoned)", abandoned);

    Ok(())
}

fn start_health_check(plugin_manager: Arc<PluginManager>) {
    tokio::spawn(async move {
        let check_interval = Duration::from_secs(300); // 5 minutes
        loop {
            for (name, health) in plugin_manager.health_report().await {
                if health.is_healthy() {
                    info!(
                        "Plugin {} {} is {:?}, {} pending tasks",
                        name, health.version, health.state, health.pending_tasks
                    );
                } else {
                    warn!("Plugin {} {} is not active: {:?}", name, health.version, health.state);
                }
            }
            tokio::time::sleep(check_interval).await;
        }
    });
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
