use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::Result;
use crate::plugins::WorkerState;

/// 定期健康检查输出的运行状况
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginHealth {
    pub version: String,
    pub state: WorkerState,
    /// 尚未完成的后台刷新
    pub pending_tasks: usize,
}

impl PluginHealth {
    pub fn is_healthy(&self) -> bool {
        self.state == WorkerState::Activated
    }
}

/// 由 `PluginManager` 驱动的生命周期：启动时安装，关闭前排空后台任务
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// 安装，并按配置决定是否立即激活
    async fn init(&self) -> Result<()>;

    /// 等待后台任务结束；超时后返回仍未完成的数量
    async fn drain(&self, timeout: Duration) -> usize;

    async fn health(&self) -> PluginHealth;
}
