use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{PluginError, Result};
use crate::plugins::network::FetchResponse;

mod bucket;
mod entry;
mod metadata;

pub use bucket::CacheBucket;
pub use metadata::CacheMetadata;

/// 多个命名缓存桶的集合，对应浏览器的 `caches`
///
/// 配置了根目录时每个桶对应一个子目录，重启后可以恢复；否则全部在内存中。
/// 桶按创建顺序排列，磁盘上的桶记录了各自的创建序号。
#[derive(Debug)]
pub struct CacheStorage {
    root_path: Option<PathBuf>,
    buckets: RwLock<Vec<Arc<CacheBucket>>>,
    next_sequence: AtomicU64,
}

impl CacheStorage {
    pub fn in_memory() -> Self {
        debug!("Initializing in-memory cache storage");
        Self {
            root_path: None,
            buckets: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// 打开磁盘缓存，并恢复上次部署遗留的所有缓存桶
    pub async fn persistent<P: AsRef<Path>>(root_path: P) -> Result<Self> {
        let root_path = root_path.as_ref().to_owned();
        info!("Initializing cache storage with root path: {:?}", root_path);
        tokio::fs::create_dir_all(&root_path).await?;

        let mut names = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&root_path).await?;
        while let Some(item) = read_dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = item.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        let mut buckets = Vec::with_capacity(names.len());
        for name in names {
            let bucket = CacheBucket::load(&name, root_path.join(&name)).await?;
            buckets.push(Arc::new(bucket));
        }
        buckets.sort_by(|a, b| (a.sequence(), a.name()).cmp(&(b.sequence(), b.name())));
        let next = buckets.iter().map(|b| b.sequence()).max().unwrap_or(0) + 1;

        Ok(Self {
            root_path: Some(root_path),
            buckets: RwLock::new(buckets),
            next_sequence: AtomicU64::new(next),
        })
    }

    /// 打开（必要时创建）指定名称的缓存桶
    pub async fn open(&self, name: &str) -> Result<Arc<CacheBucket>> {
        validate_name(name)?;
        let mut buckets = self.buckets.write().await;
        if let Some(bucket) = buckets.iter().find(|b| b.name() == name) {
            return Ok(bucket.clone());
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let bucket = match &self.root_path {
            Some(root) => CacheBucket::create(name, root.join(name), sequence).await?,
            None => CacheBucket::in_memory(name, sequence),
        };
        let bucket = Arc::new(bucket);
        buckets.push(bucket.clone());
        info!("Created cache bucket: {}", name);
        Ok(bucket)
    }

    /// 只返回已经存在的缓存桶，不会创建
    pub async fn get(&self, name: &str) -> Option<Arc<CacheBucket>> {
        self.buckets.read().await.iter().find(|b| b.name() == name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.buckets.read().await.iter().any(|b| b.name() == name)
    }

    /// 按创建顺序返回所有缓存桶名称
    pub async fn keys(&self) -> Vec<String> {
        self.buckets
            .read()
            .await
            .iter()
            .map(|b| b.name().to_string())
            .collect()
    }

    pub async fn delete(&self, name: &str) -> Result<bool> {
        let removed = {
            let mut buckets = self.buckets.write().await;
            match buckets.iter().position(|b| b.name() == name) {
                Some(pos) => Some(buckets.remove(pos)),
                None => None,
            }
        };

        let Some(bucket) = removed else {
            return Ok(false);
        };

        if let Some(dir) = bucket.dir() {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            "Deleted cache bucket: {} ({} entries, {} bytes)",
            name,
            bucket.len().await,
            bucket.used_space().await
        );
        Ok(true)
    }

    /// 在所有缓存桶中查找，先创建的桶优先，对应 `caches.match`
    ///
    /// 单个桶读取失败按未命中处理。
    pub async fn match_request(&self, key: &str) -> Option<FetchResponse> {
        let buckets = self.buckets.read().await.clone();
        for bucket in buckets {
            match bucket.get(key).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => warn!("Cache read failed in {} for {}: {}", bucket.name(), key, e),
            }
        }
        None
    }

    /// 每个缓存桶的条目数
    pub async fn info(&self) -> BTreeMap<String, usize> {
        let buckets = self.buckets.read().await.clone();
        let mut info = BTreeMap::new();
        for bucket in buckets {
            info.insert(bucket.name().to_string(), bucket.len().await);
        }
        info
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PluginError::InvalidInput(format!("Invalid cache name: {}", name)))
    }
}
