use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{PluginError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub blog: BlogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 实际回源地址，同源请求会被映射到这里
    pub upstream: String,
    pub control_path: String,
    pub fetch_timeout_secs: u64,
    /// 关闭时等待后台刷新的最长时间
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 站点对外的 origin，用于生成缓存 key
    pub origin: String,
    pub cache_prefix: String,
    pub version: String,
    /// 为空时使用内存缓存
    pub cache_dir: Option<PathBuf>,
    pub skip_waiting: bool,
    pub precache: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub content_root: PathBuf,
    pub manifest_path: String,
    pub posts_directory: String,
    pub related_limit: usize,
    pub site_url: String,
    pub author: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // 首先尝试从环境变量加载
        if let Ok(config_path) = std::env::var("CONFIG_PATH") {
            return Self::from_file(&config_path);
        }

        // 否则使用默认配置
        Ok(Self::default())
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| PluginError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.worker.version.trim().is_empty() {
            return Err(PluginError::Config("worker.version must not be empty".into()));
        }
        url::Url::parse(&self.worker.origin)
            .map_err(|e| PluginError::Config(format!("worker.origin: {}", e)))?;
        url::Url::parse(&self.server.upstream)
            .map_err(|e| PluginError::Config(format!("server.upstream: {}", e)))?;
        Ok(())
    }
}

impl WorkerConfig {
    pub fn precache_name(&self) -> String {
        format!("{}-precache-{}", self.cache_prefix, self.version)
    }

    pub fn runtime_name(&self) -> String {
        format!("{}-runtime-{}", self.cache_prefix, self.version)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            worker: WorkerConfig::default(),
            blog: BlogConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upstream: "http://127.0.0.1:8000".to_string(),
            control_path: "/__worker/message".to_string(),
            fetch_timeout_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".to_string(),
            cache_prefix: "site".to_string(),
            version: "v1.0.0".to_string(),
            cache_dir: None,
            skip_waiting: true,
            precache: default_precache(),
        }
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            content_root: "./site".into(),
            manifest_path: "/blog/posts-manifest.json".to_string(),
            posts_directory: "/blog/posts/".to_string(),
            related_limit: 3,
            site_url: "https://savoie.app".to_string(),
            author: "Eric Savoie".to_string(),
        }
    }
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/apps/",
        "/apps/index.html",
        "/assets/css/main.css",
        "/assets/js/components/navbar.js",
        "/assets/js/components/app-manager.js",
        "/assets/js/utils/seo.js",
        "/assets/js/utils/image-optimization.js",
        "/assets/images/icons/favicon.ico",
        "/assets/images/icons/apple-touch-icon.png",
        "/assets/images/icons/icon-192.png",
        "/assets/images/icons/icon-512.png",
        "/privacy-policy.html",
        "/terms.html",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
