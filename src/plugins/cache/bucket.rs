use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::entry::{CacheEntry, EntryBody};
use super::metadata::CacheMetadata;
use crate::error::{PluginError, Result};
use crate::plugins::network::FetchResponse;
use crate::utils::hash_url;

/// 桶目录下记录创建顺序的文件，扩展名不是 json，不会被当成条目
const BUCKET_INFO: &str = "bucket.info";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BucketInfo {
    sequence: u64,
    created_at: DateTime<Utc>,
}

/// 一个命名缓存桶：请求 key -> 响应，同一 key 只保留一份
#[derive(Debug)]
pub struct CacheBucket {
    name: String,
    /// 创建顺序，重启后保持不变
    sequence: u64,
    dir: Option<PathBuf>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// 同一个桶的写入串行执行，保证 .bin 和 .json 成对
    writes: Mutex<()>,
}

impl CacheBucket {
    pub(crate) fn in_memory(name: &str, sequence: u64) -> Self {
        Self {
            name: name.to_string(),
            sequence,
            dir: None,
            entries: RwLock::new(HashMap::new()),
            writes: Mutex::new(()),
        }
    }

    pub(crate) async fn create(name: &str, dir: PathBuf, sequence: u64) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let info = BucketInfo {
            sequence,
            created_at: Utc::now(),
        };
        write_atomic(&dir.join(BUCKET_INFO), &serde_json::to_vec(&info)?).await?;
        Ok(Self {
            name: name.to_string(),
            sequence,
            dir: Some(dir),
            entries: RwLock::new(HashMap::new()),
            writes: Mutex::new(()),
        })
    }

    /// 从磁盘目录恢复索引，损坏的元数据文件会被跳过
    pub(crate) async fn load(name: &str, dir: PathBuf) -> Result<Self> {
        let sequence = read_sequence(&dir).await;
        let mut entries = HashMap::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;

        while let Some(item) = read_dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Failed to read cache metadata {:?}: {}", path, e);
                    continue;
                }
            };
            let metadata: CacheMetadata = match serde_json::from_slice(&raw) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping corrupt cache metadata {:?}: {}", path, e);
                    continue;
                }
            };

            let body_path = path.with_extension("bin");
            if !tokio::fs::try_exists(&body_path).await.unwrap_or(false) {
                warn!("Cache body missing for key: {}", metadata.key);
                continue;
            }
            entries.insert(metadata.key.clone(), CacheEntry {
                body: EntryBody::Disk(body_path),
                metadata,
            });
        }

        info!("Loaded cache bucket {} with {} entries", name, entries.len());
        Ok(Self {
            name: name.to_string(),
            sequence,
            dir: Some(dir),
            entries: RwLock::new(entries),
            writes: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub async fn get(&self, key: &str) -> Result<Option<FetchResponse>> {
        let entry = match self.entries.read().await.get(key) {
            Some(entry) => entry.clone(),
            None => {
                debug!("Cache miss in {} for key: {}", self.name, key);
                return Ok(None);
            }
        };

        let body = entry.read_body().await.map_err(|e| {
            error!("Failed to read cache body for key {}: {}", key, e);
            PluginError::Storage(e.to_string())
        })?;
        debug!("Cache hit in {} for key: {} ({} bytes)", self.name, key, body.len());
        entry.metadata.to_response(body).map(Some)
    }

    pub async fn put(&self, key: &str, response: &FetchResponse) -> Result<()> {
        let metadata = CacheMetadata::from_response(key, response);
        let _write = self.writes.lock().await;

        let body = match &self.dir {
            Some(dir) => {
                let stem = dir.join(hash_url(key));
                let body_path = stem.with_extension("bin");
                write_atomic(&body_path, &response.body).await?;
                write_atomic(&stem.with_extension("json"), &serde_json::to_vec(&metadata)?).await?;
                EntryBody::Disk(body_path)
            }
            None => EntryBody::Memory(response.body.clone()),
        };

        debug!(
            "Stored {} bytes ({}) in {} for key: {}",
            metadata.size,
            metadata.content_type().unwrap_or("unknown type"),
            self.name,
            key
        );
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry { body, metadata });
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let _write = self.writes.lock().await;
        let removed = self.entries.write().await.remove(key);
        match removed {
            Some(entry) => {
                if let EntryBody::Disk(path) = &entry.body {
                    remove_if_exists(path).await?;
                    remove_if_exists(&path.with_extension("json")).await?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn used_space(&self) -> u64 {
        self.entries.read().await.values().map(|e| e.size()).sum()
    }
}

/// 没有记录文件的旧目录排在最前面
async fn read_sequence(dir: &Path) -> u64 {
    let raw = match tokio::fs::read(dir.join(BUCKET_INFO)).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No bucket info in {:?}: {}", dir, e);
            return 0;
        }
    };
    match serde_json::from_slice::<BucketInfo>(&raw) {
        Ok(info) => info.sequence,
        Err(e) => {
            warn!("Corrupt bucket info in {:?}: {}", dir, e);
            0
        }
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
