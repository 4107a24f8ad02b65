use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::{PluginError, Result};
use crate::plugin::{Plugin, PluginHealth};

/// 按注册顺序管理插件
///
/// 初始化失败的插件仍然保留：安装失败的 worker 会让旧版本缓存继续生效，
/// 健康检查和关闭流程都需要看到它。
pub struct PluginManager {
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    drain_timeout: Duration,
}

impl PluginManager {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
            drain_timeout,
        }
    }

    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        info!("Registering plugin: {} {}", name, plugin.version());

        let mut plugins = self.plugins.write().await;
        if plugins.iter().any(|p| p.name() == name) {
            return Err(PluginError::Plugin(format!("Plugin {} already registered", name)));
        }
        plugins.push(plugin.clone());
        drop(plugins);

        match plugin.init().await {
            Ok(()) => {
                info!("Plugin {} ready", name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize plugin {}: {}", name, e);
                Err(e)
            }
        }
    }

    pub async fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .await
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    pub async fn health_report(&self) -> BTreeMap<String, PluginHealth> {
        let plugins = self.plugins.read().await.clone();
        let mut report = BTreeMap::new();
        for plugin in plugins {
            report.insert(plugin.name().to_string(), plugin.health().await);
        }
        report
    }

    /// 关闭前排空所有插件的后台任务，返回每个插件被放弃的任务数
    pub async fn shutdown(&self) -> BTreeMap<String, usize> {
        let plugins = self.plugins.read().await.clone();
        let mut abandoned = BTreeMap::new();
        for plugin in plugins {
            let left = plugin.drain(self.drain_timeout).await;
            if left > 0 {
                warn!(
                    "Plugin {} still had {} background tasks after {:?}",
                    plugin.name(),
                    left,
                    self.drain_timeout
                );
            }
            abandoned.insert(plugin.name().to_string(), left);
        }
        abandoned
    }
}
